//! The action protocol consumed by the orchestrating agent layer.
//!
//! Actions address a registered root by `file://` URI and carry their
//! arguments as a JSON object.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{FilesystemError, Result};
use crate::types::{EntrySummary, ReadPayload};

/// An action request against a registered resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub uri: String,
    pub action_id: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl Action {
    pub fn new(uri: impl Into<String>, action_id: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            uri: uri.into(),
            action_id: action_id.into(),
            args,
        }
    }
}

/// What an action produced.
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    /// Ranked or listed entry summaries (`search`, `list`).
    Entries(Vec<EntrySummary>),
    /// File content (`read`).
    Content(ReadPayload),
    /// The normalized path acted upon (`register`, `unregister`).
    Path(PathBuf),
}

/// Converts a `file://` URI into a filesystem path.
pub fn file_uri_to_path(uri: &str) -> Result<PathBuf> {
    let rest = uri
        .strip_prefix("file://")
        .ok_or_else(|| FilesystemError::InvalidUri(uri.to_string()))?;
    if rest.is_empty() || !rest.starts_with('/') {
        return Err(FilesystemError::InvalidUri(uri.to_string()));
    }
    Ok(PathBuf::from(rest))
}

/// Builds the canonical `file://` URI for a path.
pub fn path_to_file_uri(path: &std::path::Path) -> String {
    format!("file://{}", path.to_string_lossy())
}

pub(crate) fn required_string(args: &serde_json::Value, key: &str) -> Result<String> {
    let value = args
        .get(key)
        .and_then(|raw| raw.as_str())
        .ok_or_else(|| FilesystemError::InvalidInput(format!("missing {key}")))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FilesystemError::InvalidInput(format!("missing {key}")));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn optional_string(args: &serde_json::Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(|raw| raw.as_str())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_uri_round_trip() {
        let path = file_uri_to_path("file:///home/user/docs").expect("parse");
        assert_eq!(path, PathBuf::from("/home/user/docs"));
        assert_eq!(path_to_file_uri(&path), "file:///home/user/docs");
    }

    #[test]
    fn non_file_schemes_are_rejected() {
        assert!(file_uri_to_path("https://example.com").is_err());
        assert!(file_uri_to_path("file://").is_err());
        assert!(file_uri_to_path("relative/path").is_err());
    }

    #[test]
    fn required_string_rejects_blank_values() {
        let args = serde_json::json!({ "query": "  " });
        assert!(required_string(&args, "query").is_err());
        assert!(required_string(&args, "missing").is_err());

        let args = serde_json::json!({ "query": " budget " });
        assert_eq!(required_string(&args, "query").expect("query"), "budget");
    }
}
