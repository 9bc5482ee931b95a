//! JSON-file-per-resource store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{CoreError, CoreResult};
use crate::resource::Resource;
use crate::store::ResourceStore;

#[derive(Debug, Clone)]
pub struct FileResourceStore {
    root: PathBuf,
}

impl FileResourceStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, uri: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_uri(uri)))
    }
}

#[async_trait]
impl ResourceStore for FileResourceStore {
    async fn put(&self, resource: &Resource) -> CoreResult<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|error| {
            CoreError::Internal(format!(
                "failed to create store directory {}: {error}",
                self.root.display()
            ))
        })?;
        let serialized = serde_json::to_vec_pretty(resource)
            .map_err(|error| CoreError::Internal(format!("store serialize error: {error}")))?;
        let path = self.path_for(&resource.uri);
        tokio::fs::write(&path, serialized).await.map_err(|error| {
            CoreError::Internal(format!(
                "failed to write store file {}: {error}",
                path.display()
            ))
        })?;
        Ok(())
    }

    async fn delete(&self, uri: &str) -> CoreResult<()> {
        let path = self.path_for(uri);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(CoreError::Internal(format!(
                "failed to delete store file {}: {error}",
                path.display()
            ))),
        }
    }

    async fn all(&self) -> CoreResult<Vec<Resource>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => {
                return Err(CoreError::Internal(format!(
                    "failed to read store directory {}: {error}",
                    self.root.display()
                )))
            }
        };

        let mut resources = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|error| {
            CoreError::Internal(format!("failed to enumerate store: {error}"))
        })? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match read_resource(&path).await {
                Ok(resource) => resources.push(resource),
                Err(error) => {
                    // One corrupt record must not take the whole store down.
                    tracing::warn!(path = %path.display(), %error, "skipping unreadable resource record");
                }
            }
        }
        Ok(resources)
    }
}

async fn read_resource(path: &Path) -> CoreResult<Resource> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|error| CoreError::Internal(format!("read failed: {error}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|error| CoreError::Internal(format!("parse failed: {error}")))
}

/// Encodes a URI into a filesystem-safe, reversible file name: ASCII
/// alphanumerics, `.` and `-` pass through, everything else becomes `_XX`
/// hex escapes.
fn encode_uri(uri: &str) -> String {
    let mut encoded = String::with_capacity(uri.len());
    for byte in uri.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'-' => {
                encoded.push(byte as char)
            }
            _ => {
                encoded.push('_');
                encoded.push_str(&format!("{byte:02x}"));
            }
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn put_all_delete_round_trip() {
        let dir = tempdir().expect("tempdir");
        let store = FileResourceStore::new(dir.path().to_path_buf());
        let resource = Resource::directory(Path::new("/data/projects"));

        store.put(&resource).await.expect("put");
        let all = store.all().await.expect("all");
        assert_eq!(all, vec![resource.clone()]);

        store.delete(&resource.uri).await.expect("delete");
        assert!(store.all().await.expect("all").is_empty());
        // Deleting again is a no-op.
        store.delete(&resource.uri).await.expect("delete twice");
    }

    #[tokio::test]
    async fn missing_store_directory_lists_empty() {
        let dir = tempdir().expect("tempdir");
        let store = FileResourceStore::new(dir.path().join("never-created"));
        assert!(store.all().await.expect("all").is_empty());
    }

    #[test]
    fn encoded_names_are_distinct_and_safe() {
        let a = encode_uri("file:///data/projects");
        let b = encode_uri("file:///data/projects-2");
        assert_ne!(a, b);
        assert!(!a.contains('/'));
        assert!(!a.contains(':'));
    }
}
