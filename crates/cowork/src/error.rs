use std::fmt;

use filesystem::FilesystemError;

/// Unified error type for the cowork crate.
#[derive(Debug)]
pub enum CoreError {
    /// Invalid input provided by the caller.
    InvalidInput(String),
    /// A resource or entry that does not exist.
    NotFound(String),
    /// An error surfaced by the filesystem engine.
    Filesystem(FilesystemError),
    /// Internal error.
    Internal(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            CoreError::NotFound(msg) => write!(f, "not found: {msg}"),
            CoreError::Filesystem(error) => write!(f, "{error}"),
            CoreError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::Filesystem(error) => Some(error),
            _ => None,
        }
    }
}

impl From<FilesystemError> for CoreError {
    fn from(error: FilesystemError) -> Self {
        CoreError::Filesystem(error)
    }
}

/// Result type alias using [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;
