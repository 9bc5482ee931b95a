//! Runtime preferences.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoworkConfig {
    /// Directory holding one JSON record per persisted resource.
    pub store_dir: PathBuf,
    /// Quiet period before a change notification fires.
    pub debounce_ms: u64,
    /// Retain full image/document payloads in memory instead of re-reading
    /// from disk on every `read`.
    pub retain_binary: bool,
    /// HTTP bind address.
    pub bind_addr: String,
}

impl Default for CoworkConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("cowork-data/resources"),
            debounce_ms: 200,
            retain_binary: false,
            bind_addr: "127.0.0.1:7171".to_string(),
        }
    }
}

impl CoworkConfig {
    /// Builds a config from `COWORK_*` environment variables, falling back
    /// to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            store_dir: std::env::var("COWORK_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_dir),
            debounce_ms: std::env::var("COWORK_DEBOUNCE_MS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.debounce_ms),
            retain_binary: std::env::var("COWORK_RETAIN_BINARY")
                .map(|raw| raw == "1" || raw.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.retain_binary),
            bind_addr: std::env::var("COWORK_BIND_ADDR").unwrap_or(defaults.bind_addr),
        }
    }
}
