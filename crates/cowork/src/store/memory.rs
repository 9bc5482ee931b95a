//! In-memory store, used by tests and ephemeral sessions.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::CoreResult;
use crate::resource::Resource;
use crate::store::ResourceStore;

#[derive(Debug, Default)]
pub struct MemoryResourceStore {
    data: Mutex<HashMap<String, Resource>>,
}

impl MemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for MemoryResourceStore {
    async fn put(&self, resource: &Resource) -> CoreResult<()> {
        self.data
            .lock()
            .insert(resource.uri.clone(), resource.clone());
        Ok(())
    }

    async fn delete(&self, uri: &str) -> CoreResult<()> {
        self.data.lock().remove(uri);
        Ok(())
    }

    async fn all(&self) -> CoreResult<Vec<Resource>> {
        Ok(self.data.lock().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[tokio::test]
    async fn put_overwrites_by_uri() {
        let store = MemoryResourceStore::new();
        let mut resource = Resource::directory(Path::new("/data"));
        store.put(&resource).await.expect("put");

        resource.name = "renamed".to_string();
        store.put(&resource).await.expect("put again");

        let all = store.all().await.expect("all");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "renamed");
    }
}
