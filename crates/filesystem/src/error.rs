use std::fs;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum FilesystemError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid URI: {0}")]
    InvalidUri(String),

    #[error("path {0} conflicts with an already registered root")]
    NestedRegistration(PathBuf),

    #[error("no index registered for path: {0}")]
    NoIndexForPath(PathBuf),

    #[error("file not found in index: {0}")]
    FileNotFound(PathBuf),

    #[error("unsupported action: {0}")]
    Unsupported(String),

    #[error("classification failed: {0}")]
    Classification(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, FilesystemError>;

/// Canonicalizes a path, returning the original if canonicalization fails.
pub fn canonicalize_existing_path(path: PathBuf) -> PathBuf {
    fs::canonicalize(&path).unwrap_or(path)
}
