//! Entry and event types for the filesystem index.
//!
//! These are the core result types used internally. The cowork crate
//! converts these to API payload types for serialization.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

/// Content classification for an indexed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Text,
    Image,
    Document,
    Binary,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Document => "document",
            Self::Binary => "binary",
        }
    }
}

/// Metadata extracted from a decoded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub has_alpha: bool,
    pub description: String,
}

/// A single file tracked by a root index.
#[derive(Debug, Clone)]
pub struct IndexedEntry {
    /// Absolute path; also the entry id.
    pub path: PathBuf,
    /// Path relative to the registered root, with `/` separators.
    pub relative_path: String,
    /// File name without directories.
    pub name: String,
    pub mime_type: String,
    pub kind: EntryKind,
    pub size: u64,
    /// Modification time as unix seconds.
    pub modified_at: u64,
    /// Cheap change-detection value: `size + modified_at`. Not a content hash.
    pub fingerprint: u64,
    /// Text content, present for text entries only.
    pub content: Option<String>,
    /// Present for image entries that decoded successfully.
    pub image: Option<ImageMetadata>,
    /// Bounded preview, encoded JPEG or PNG.
    pub thumbnail: Option<Vec<u8>>,
    /// Full payload for image/document entries. Retained only when the
    /// owning index opts in; `read` falls back to disk otherwise.
    pub binary_data: Option<Vec<u8>>,
}

impl IndexedEntry {
    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            path: self.path.to_string_lossy().into_owned(),
            relative_path: self.relative_path.clone(),
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            kind: self.kind,
            size: self.size,
            modified_at: self.modified_at,
            description: self.image.as_ref().map(|image| image.description.clone()),
        }
    }
}

/// What `search` and `list` return: entry metadata without content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySummary {
    pub path: String,
    pub relative_path: String,
    pub name: String,
    pub mime_type: String,
    pub kind: EntryKind,
    pub size: u64,
    pub modified_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Normalized filesystem change delivered by a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Change,
    Unlink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub relative_path: PathBuf,
}

/// The result of a `read` action.
#[derive(Debug, Clone)]
pub enum ReadPayload {
    /// Text content.
    Text(String),
    /// Structured binary payload for an image.
    Image {
        data: Vec<u8>,
        filename: String,
        mime_type: String,
    },
    /// Raw bytes for rich-viewer rendering of a document.
    Document {
        data: Vec<u8>,
        filename: String,
        mime_type: String,
    },
    /// Raw bytes for files with no recognized content type.
    Binary {
        data: Vec<u8>,
        filename: String,
        mime_type: String,
    },
}

/// Computes the change-detection fingerprint from size and mtime.
pub fn fingerprint(size: u64, modified_at: u64) -> u64 {
    size.wrapping_add(modified_at)
}

/// Extracts unix-second mtime from metadata, zero when unavailable.
pub fn modified_unix_secs(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

/// File name component as an owned string, empty when the path has none.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
