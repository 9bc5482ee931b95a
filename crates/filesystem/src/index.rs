//! Per-root filesystem index.
//!
//! A `RootIndex` owns one registered root path: it scans it, classifies
//! each file (text / image / document / generic binary), and keeps an
//! in-memory entry map plus a search structure in lockstep. Every mutation
//! rebuilds the search structure, so partial states are never observable.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::{FilesystemError, Result};
use crate::media;
use crate::search::{wildcard_matches, SearchIndex};
use crate::types::{
    file_name_of, fingerprint, modified_unix_secs, ChangeEvent, ChangeKind, EntryKind,
    EntrySummary, IndexedEntry,
};

/// Build and dependency directories that are never indexed.
pub const IGNORED_DIR_NAMES: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    "vendor",
    "__pycache__",
    "venv",
    "coverage",
];

/// Text files above this size keep base fields only.
const MAX_TEXT_CONTENT_BYTES: u64 = 2 * 1024 * 1024;

/// Binary media above this size is never pulled through the classifier.
const MAX_MEDIA_BYTES: u64 = 32 * 1024 * 1024;

/// Options controlling how a root index treats payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    /// Retain full image/document payloads in memory. Off by default;
    /// `read` falls back to disk.
    pub retain_binary: bool,
}

#[derive(Debug)]
pub struct RootIndex {
    root: PathBuf,
    options: IndexOptions,
    /// True for single-file registrations: the full directory was never
    /// scanned, so lookups may stat the disk and cache the result.
    skip_full_scan: bool,
    entries: HashMap<PathBuf, IndexedEntry>,
    search: SearchIndex,
    errors: usize,
}

impl RootIndex {
    pub fn new(root: PathBuf, skip_full_scan: bool, options: IndexOptions) -> Self {
        Self {
            root,
            options,
            skip_full_scan,
            entries: HashMap::new(),
            search: SearchIndex::new(),
            errors: 0,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn skip_full_scan(&self) -> bool {
        self.skip_full_scan
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// Recursively scans the root and indexes every file, then rebuilds the
    /// search structure once. Hidden entries, the fixed ignore-list, and
    /// anything resolving outside the root are skipped; per-entry failures
    /// are logged and scanning continues.
    pub fn initialize(&mut self) {
        self.skip_full_scan = false;
        self.entries.clear();
        let root = self.root.clone();
        self.scan_subtree(&root);
        self.rebuild_search();
        log::info!(
            "indexed root {} entries={} errors={}",
            self.root.display(),
            self.entries.len(),
            self.errors
        );
    }

    /// Walks `start` (inside the root) and indexes files without rebuilding
    /// the search structure; callers rebuild when the batch is done.
    fn scan_subtree(&mut self, start: &Path) {
        let walker = WalkBuilder::new(start)
            .standard_filters(false)
            .hidden(true)
            .follow_links(false)
            .filter_entry(|entry| {
                entry.depth() == 0 || !is_ignored_name(&entry.file_name().to_string_lossy())
            })
            .build();

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(error) => {
                    log::warn!("scan error under {}: {error}", self.root.display());
                    self.errors += 1;
                    continue;
                }
            };
            // Symlinks can point anywhere; never index outside the root.
            if !entry.path().starts_with(&self.root) {
                log::warn!(
                    "skipping {} outside root {}",
                    entry.path().display(),
                    self.root.display()
                );
                continue;
            }
            if entry.file_type().map(|kind| kind.is_file()) != Some(true) {
                continue;
            }
            if let Err(error) = self.index_file(entry.path()) {
                log::warn!("failed to index {}: {error}", entry.path().display());
                self.errors += 1;
            }
        }
    }

    /// Indexes or re-indexes a single file and keeps the search structure in
    /// agreement with the entry map.
    pub fn index_file(&mut self, path: &Path) -> Result<()> {
        self.index_file_inner(path)?;
        self.rebuild_search();
        Ok(())
    }

    fn index_file_inner(&mut self, path: &Path) -> Result<()> {
        let metadata = fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(FilesystemError::InvalidInput(format!(
                "not a file: {}",
                path.display()
            )));
        }

        let size = metadata.len();
        let modified_at = modified_unix_secs(&metadata);
        let mime_type = media::mime_type_for_path(path);
        let kind = media::entry_kind_for_mime(mime_type);

        let relative_path = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        let mut entry = IndexedEntry {
            path: path.to_path_buf(),
            relative_path,
            name: file_name_of(path),
            mime_type: mime_type.to_string(),
            kind,
            size,
            modified_at,
            fingerprint: fingerprint(size, modified_at),
            content: None,
            image: None,
            thumbnail: None,
            binary_data: None,
        };

        match kind {
            EntryKind::Text => {
                if size <= MAX_TEXT_CONTENT_BYTES {
                    match fs::read_to_string(path) {
                        Ok(content) => entry.content = Some(content),
                        Err(_) => {
                            // Extension said text but the bytes disagree.
                            entry.kind = EntryKind::Binary;
                        }
                    }
                } else {
                    log::debug!(
                        "skipping content of oversized text file {}",
                        path.display()
                    );
                }
            }
            EntryKind::Image if size <= MAX_MEDIA_BYTES => {
                let bytes = fs::read(path)?;
                match media::classify_image(&bytes, mime_type) {
                    Ok(classified) => {
                        entry.image = Some(classified.metadata);
                        entry.thumbnail = classified.thumbnail;
                    }
                    Err(error) => {
                        // Non-fatal: the entry stays with base fields only.
                        log::warn!("classification failed for {}: {error}", path.display());
                        self.errors += 1;
                    }
                }
                if self.options.retain_binary {
                    entry.binary_data = Some(bytes);
                }
            }
            EntryKind::Document if size <= MAX_MEDIA_BYTES => {
                if self.options.retain_binary {
                    let bytes = fs::read(path)?;
                    entry.binary_data = Some(media::classify_document(bytes, mime_type));
                }
            }
            _ => {}
        }

        self.entries.insert(entry.path.clone(), entry);
        Ok(())
    }

    /// Applies a normalized change event: add/change re-index the file,
    /// unlink drops it. The search structure is rebuilt either way.
    pub fn handle_file_change(&mut self, event: &ChangeEvent) {
        let absolute = self.root.join(&event.relative_path);
        match event.kind {
            ChangeKind::Add | ChangeKind::Change => {
                if absolute.is_dir() {
                    // A directory appeared (move-in, unpack); index its files.
                    self.scan_subtree(&absolute);
                } else if let Err(error) = self.index_file_inner(&absolute) {
                    log::warn!("failed to re-index {}: {error}", absolute.display());
                    self.errors += 1;
                }
            }
            ChangeKind::Unlink => {
                // Unlink events do not say whether a file or a directory
                // vanished; drop everything under the path.
                self.entries.retain(|path, _| !path.starts_with(&absolute));
            }
        }
        self.rebuild_search();
    }

    /// Full-text query over name, relative path, and content.
    pub fn search(&self, query: &str) -> Vec<EntrySummary> {
        self.search
            .query(query)
            .into_iter()
            .filter_map(|hit| self.entries.get(&hit.path).map(IndexedEntry::summary))
            .collect()
    }

    /// All entries, optionally filtered by a simple `*`/`?` glob against the
    /// relative path, sorted by relative path.
    pub fn list_files(&self, pattern: Option<&str>) -> Vec<EntrySummary> {
        let mut summaries: Vec<EntrySummary> = self
            .entries
            .values()
            .filter(|entry| match pattern {
                Some(pattern) => {
                    wildcard_matches(pattern, &entry.relative_path)
                        || wildcard_matches(pattern, &entry.name)
                }
                None => true,
            })
            .map(IndexedEntry::summary)
            .collect();
        summaries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        summaries
    }

    /// Synchronous cache lookup by absolute path.
    pub fn get_file(&self, path: &Path) -> Option<&IndexedEntry> {
        self.entries.get(path)
    }

    /// Lookup that falls back to a direct filesystem read when the index was
    /// built in skip-full-scan mode, caching the result.
    pub async fn get_file_async(&mut self, path: &Path) -> Option<&IndexedEntry> {
        if !self.entries.contains_key(path) && self.skip_full_scan {
            if tokio::fs::metadata(path).await.is_ok() {
                if let Err(error) = self.index_file(path) {
                    log::warn!("lazy index of {} failed: {error}", path.display());
                }
            }
        }
        self.entries.get(path)
    }

    /// Resolves a `read` target: absolute path first, stored relative path
    /// next, bare filename last.
    pub fn resolve_entry(&self, requested: &Path) -> Option<&IndexedEntry> {
        if let Some(entry) = self.entries.get(requested) {
            return Some(entry);
        }
        let requested_str = requested.to_string_lossy().replace('\\', "/");
        if let Some(entry) = self
            .entries
            .values()
            .find(|entry| entry.relative_path == requested_str)
        {
            return Some(entry);
        }
        let filename = file_name_of(requested);
        if filename.is_empty() {
            return None;
        }
        self.entries.values().find(|entry| entry.name == filename)
    }

    fn rebuild_search(&mut self) {
        self.search.rebuild(self.entries.values());
    }
}

/// True for names the scanner never descends into.
pub fn is_ignored_name(name: &str) -> bool {
    IGNORED_DIR_NAMES.contains(&name)
}

/// True when any component of a root-relative path is hidden or ignored.
/// Used to drop watcher events for paths the scanner would have skipped.
pub fn relative_path_is_ignored(relative: &Path) -> bool {
    relative.components().any(|component| {
        let name = component.as_os_str().to_string_lossy();
        name.starts_with('.') || is_ignored_name(&name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        let mut file = File::create(&path).expect("create");
        file.write_all(content.as_bytes()).expect("write");
        path
    }

    fn scanned_index(root: &Path) -> RootIndex {
        let mut index = RootIndex::new(root.to_path_buf(), false, IndexOptions::default());
        index.initialize();
        index
    }

    #[test]
    fn initialize_indexes_files_and_skips_ignored() {
        let dir = tempdir().expect("tempdir");
        write_file(dir.path(), "readme.md", "hello indexing");
        write_file(dir.path(), "src/lib.rs", "pub fn answer() {}");
        write_file(dir.path(), "node_modules/dep/index.js", "ignored");
        write_file(dir.path(), ".hidden/secret.txt", "ignored");

        let index = scanned_index(dir.path());

        assert_eq!(index.entry_count(), 2);
        assert!(index.get_file(&dir.path().join("readme.md")).is_some());
        assert!(index
            .get_file(&dir.path().join("node_modules/dep/index.js"))
            .is_none());
    }

    #[test]
    fn search_finds_by_name_and_content() {
        let dir = tempdir().expect("tempdir");
        write_file(dir.path(), "budget.md", "numbers");
        write_file(dir.path(), "notes.md", "the budget went up");
        write_file(dir.path(), "unrelated.md", "nothing here");

        let index = scanned_index(dir.path());
        let hits = index.search("budget");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "budget.md");
    }

    #[test]
    fn list_files_honors_glob_pattern() {
        let dir = tempdir().expect("tempdir");
        write_file(dir.path(), "a.md", "");
        write_file(dir.path(), "b.md", "");
        write_file(dir.path(), "c.txt", "");

        let index = scanned_index(dir.path());
        assert_eq!(index.list_files(None).len(), 3);

        let markdown = index.list_files(Some("*.md"));
        assert_eq!(markdown.len(), 2);
        assert_eq!(markdown[0].relative_path, "a.md");
        assert_eq!(markdown[1].relative_path, "b.md");
    }

    #[test]
    fn change_event_updates_fingerprint() {
        let dir = tempdir().expect("tempdir");
        let path = write_file(dir.path(), "data.txt", "v1");
        let mut index = scanned_index(dir.path());
        let before = index.get_file(&path).expect("entry").fingerprint;

        write_file(dir.path(), "data.txt", "version two, longer");
        index.handle_file_change(&ChangeEvent {
            kind: ChangeKind::Change,
            relative_path: PathBuf::from("data.txt"),
        });

        let after = index.get_file(&path).expect("entry").fingerprint;
        assert_ne!(before, after);
    }

    #[test]
    fn unlink_removes_entry_from_map_and_search() {
        let dir = tempdir().expect("tempdir");
        let path = write_file(dir.path(), "gone.txt", "soon removed");
        let mut index = scanned_index(dir.path());
        assert_eq!(index.search("gone").len(), 1);

        fs::remove_file(&path).expect("remove");
        index.handle_file_change(&ChangeEvent {
            kind: ChangeKind::Unlink,
            relative_path: PathBuf::from("gone.txt"),
        });

        assert!(index.get_file(&path).is_none());
        assert!(index.search("gone").is_empty());
    }

    #[test]
    fn read_resolution_falls_back_to_relative_then_filename() {
        let dir = tempdir().expect("tempdir");
        let absolute = write_file(dir.path(), "docs/guide.md", "content");
        let index = scanned_index(dir.path());

        assert!(index.resolve_entry(&absolute).is_some());
        assert!(index.resolve_entry(Path::new("docs/guide.md")).is_some());
        assert!(index.resolve_entry(Path::new("guide.md")).is_some());
        assert!(index.resolve_entry(Path::new("missing.md")).is_none());
    }

    #[tokio::test]
    async fn skip_scan_index_lazily_stats_and_caches() {
        let dir = tempdir().expect("tempdir");
        let indexed = write_file(dir.path(), "only.txt", "single file");
        let other = write_file(dir.path(), "other.txt", "appeared later");

        let mut index = RootIndex::new(dir.path().to_path_buf(), true, IndexOptions::default());
        index.index_file(&indexed).expect("index single file");
        assert!(index.get_file(&other).is_none());

        assert!(index.get_file_async(&other).await.is_some());
        // Cached now; the sync lookup sees it too.
        assert!(index.get_file(&other).is_some());
    }
}
