//! Search structure for a single root index.
//!
//! A flat document list rebuilt wholesale on every index mutation.
//! Rebuild-on-write keeps the map and the search structure trivially in
//! agreement; incremental maintenance is not worth it at the root sizes
//! this engine targets.
//!
//! Scoring weights name matches highest, relative-path matches next, and
//! content matches lowest, with fuzzy tolerance on name terms so short,
//! imprecise queries still land.

use std::path::PathBuf;

use crate::types::IndexedEntry;

const NAME_WEIGHT: f64 = 4.0;
const PATH_WEIGHT: f64 = 2.0;
const CONTENT_WEIGHT: f64 = 1.0;

/// Extra credit when a name starts with the term.
const PREFIX_BONUS: f64 = 1.5;

/// Minimum Jaro-Winkler similarity for a fuzzy name hit.
const FUZZY_THRESHOLD: f64 = 0.86;

/// Cap on how much content is scanned per document when scoring.
const CONTENT_SCAN_LIMIT: usize = 64 * 1024;

#[derive(Debug, Default)]
pub struct SearchIndex {
    docs: Vec<SearchDoc>,
}

#[derive(Debug)]
struct SearchDoc {
    path: PathBuf,
    name: String,
    stem: String,
    relative_path: String,
    content: Option<String>,
}

/// A ranked search hit pointing back into the entry map.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub path: PathBuf,
    pub score: f64,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the document list from the entry map.
    pub fn rebuild<'a>(&mut self, entries: impl Iterator<Item = &'a IndexedEntry>) {
        self.docs = entries
            .map(|entry| {
                let name = entry.name.to_lowercase();
                let stem = name
                    .rsplit_once('.')
                    .map(|(stem, _)| stem.to_string())
                    .unwrap_or_else(|| name.clone());
                SearchDoc {
                    path: entry.path.clone(),
                    name,
                    stem,
                    relative_path: entry.relative_path.to_lowercase(),
                    content: entry.content.as_ref().map(|content| {
                        let mut lowered = content.to_lowercase();
                        if lowered.len() > CONTENT_SCAN_LIMIT {
                            let mut cut = CONTENT_SCAN_LIMIT;
                            while !lowered.is_char_boundary(cut) {
                                cut -= 1;
                            }
                            lowered.truncate(cut);
                        }
                        lowered
                    }),
                }
            })
            .collect();
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Runs a free-text query and returns hits ranked by descending score,
    /// ties broken by path for stable ordering.
    pub fn query(&self, raw_query: &str) -> Vec<SearchHit> {
        let terms: Vec<String> = raw_query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .docs
            .iter()
            .filter_map(|doc| {
                let score: f64 = terms.iter().map(|term| score_term(doc, term)).sum();
                (score > 0.0).then(|| SearchHit {
                    path: doc.path.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.path.cmp(&b.path))
        });
        hits
    }
}

fn score_term(doc: &SearchDoc, term: &str) -> f64 {
    let mut score = 0.0;

    if doc.name.contains(term) {
        score += NAME_WEIGHT;
        if doc.name.starts_with(term) || doc.stem == *term {
            score += PREFIX_BONUS;
        }
    } else {
        // Tolerate near-miss spellings against the file stem only; path and
        // content stay exact so fuzz does not flood results.
        let similarity = strsim::jaro_winkler(term, &doc.stem);
        if similarity >= FUZZY_THRESHOLD {
            score += NAME_WEIGHT * similarity * 0.5;
        }
    }

    if doc.relative_path.contains(term) {
        score += PATH_WEIGHT;
    }

    if let Some(content) = doc.content.as_ref() {
        if content.contains(term) {
            score += CONTENT_WEIGHT;
        }
    }

    score
}

/// Matches a pattern with `*` and `?` wildcards against a candidate string.
/// `*` spans any run of characters, including path separators; every other
/// character matches literally.
pub fn wildcard_matches(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();

    let mut p = 0usize;
    let mut c = 0usize;
    let mut backtrack: Option<(usize, usize)> = None;

    while c < candidate.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == candidate[c]) {
            p += 1;
            c += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, c));
            p += 1;
        } else if let Some((star_p, star_c)) = backtrack {
            backtrack = Some((star_p, star_c + 1));
            p = star_p + 1;
            c = star_c + 1;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}
