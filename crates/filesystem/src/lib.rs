//! Local filesystem indexing, search, and change watching.
//!
//! This crate provides the engine behind workspace file resources:
//! - Per-root indexes with content/field search
//! - Binary media classification (dimensions, thumbnails, descriptions)
//! - Change watching with normalized add/change/unlink events
//! - A root path registry that routes actions and enforces the
//!   no-nested-roots invariant

pub mod action;
pub mod error;
pub mod index;
pub mod media;
pub mod registry;
pub mod search;
pub mod types;
pub mod watcher;

// Re-export main types
pub use action::{file_uri_to_path, path_to_file_uri, Action, ActionOutcome};
pub use error::{FilesystemError, Result};
pub use index::{IndexOptions, RootIndex, IGNORED_DIR_NAMES};
pub use media::{classify_document, classify_image, ClassifiedImage, THUMBNAIL_MAX_EDGE};
pub use registry::{PathRegistry, RootRegistration, RootStatus};
pub use search::SearchIndex;
pub use types::{
    ChangeEvent, ChangeKind, EntryKind, EntrySummary, ImageMetadata, IndexedEntry, ReadPayload,
};
pub use watcher::{ChangeWatcher, WatchState};
