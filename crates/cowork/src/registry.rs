//! Top-level resource registry.
//!
//! Owns the collection of all addressable resources, their persistence,
//! and subscriber notification. Mutations are serialized through one
//! operation lock; `add` calls that arrive while an operation is in flight
//! are queued and replayed by the lock holder, so registration side effects
//! (index creation, directory scans) never race and a burst of adds under
//! one new directory registers that directory exactly once.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{broadcast, Mutex, RwLock};

use filesystem::{Action, ActionOutcome, IndexOptions, PathRegistry, RootStatus};

use crate::config::CoworkConfig;
use crate::error::{CoreError, CoreResult};
use crate::events::ChangeNotifier;
use crate::resource::Resource;
use crate::store::SharedStore;

pub struct ResourceRegistry {
    resources: RwLock<HashMap<String, Resource>>,
    /// Serializes add/remove/load. Held across registration side effects.
    op_lock: Mutex<()>,
    /// Adds deferred while the operation lock was held.
    pending: SyncMutex<Vec<Resource>>,
    paths: Arc<PathRegistry>,
    store: SharedStore,
    notifier: ChangeNotifier,
}

impl ResourceRegistry {
    pub fn new(store: SharedStore, config: &CoworkConfig) -> Self {
        Self {
            resources: RwLock::new(HashMap::new()),
            op_lock: Mutex::new(()),
            pending: SyncMutex::new(Vec::new()),
            paths: Arc::new(PathRegistry::new(IndexOptions {
                retain_binary: config.retain_binary,
            })),
            store,
            notifier: ChangeNotifier::new(Duration::from_millis(config.debounce_ms)),
        }
    }

    /// Registers a resource. A no-op when the URI is already present.
    ///
    /// When another add/remove/load is in flight, the resource is queued
    /// and processed by the in-flight operation before it releases the
    /// lock; the call returns immediately.
    pub async fn add(&self, resource: Resource) -> CoreResult<()> {
        if self.resources.read().await.contains_key(&resource.uri) {
            return Ok(());
        }

        let guard = match self.op_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!(uri = %resource.uri, "registry busy, deferring add");
                self.pending.lock().push(resource);
                return Ok(());
            }
        };

        let result = self.apply_add(resource).await;
        if result.is_ok() {
            self.notifier.mark();
        }
        self.drain_pending().await;
        drop(guard);
        result
    }

    /// Removes a resource by URI. Unknown URIs are a no-op. Serialized on
    /// the operation lock rather than deferred, so a remove never reorders
    /// after adds it should precede.
    pub async fn remove(&self, uri: &str) -> CoreResult<()> {
        let guard = self.op_lock.lock().await;

        let resource = self.resources.read().await.get(uri).cloned();
        let result = match resource {
            Some(resource) => {
                if resource.is_filesystem_backed() {
                    if let Some(path) = resource.fs_path() {
                        // Single-file resources name a path that was never a
                        // root of its own; unregister is a no-op for those.
                        if let Err(error) = self.paths.unregister(path).await {
                            tracing::warn!(uri, %error, "failed to unregister root");
                        }
                    }
                }
                self.resources.write().await.remove(uri);
                self.store.delete(uri).await?;
                self.notifier.mark();
                Ok(())
            }
            None => Ok(()),
        };

        self.drain_pending().await;
        drop(guard);
        result
    }

    /// Replays persisted resources at startup: directory roots are rescanned
    /// and watched again, single files re-register against their parent
    /// without a full scan. A root that fails to register (deleted since the
    /// last run, for instance) keeps its resource listed but degraded.
    pub async fn load(&self) -> CoreResult<()> {
        let _guard = self.op_lock.lock().await;

        let persisted = self.store.all().await?;
        let mut restored = 0usize;
        for resource in persisted {
            if self.resources.read().await.contains_key(&resource.uri) {
                continue;
            }
            if resource.is_filesystem_backed() {
                match resource.fs_path() {
                    Some(path) => {
                        if let Err(error) = self.paths.register(path, None).await {
                            tracing::warn!(
                                uri = %resource.uri,
                                %error,
                                "failed to re-register root at startup"
                            );
                        }
                    }
                    None => {
                        tracing::warn!(uri = %resource.uri, "persisted resource has a bad URI");
                    }
                }
            }
            self.resources
                .write()
                .await
                .insert(resource.uri.clone(), resource);
            restored += 1;
        }
        if restored > 0 {
            self.notifier.mark();
        }
        tracing::info!(restored, "loaded persisted resources");
        Ok(())
    }

    /// All registered resources, ordered by URI.
    pub async fn all(&self) -> Vec<Resource> {
        let mut resources: Vec<Resource> =
            self.resources.read().await.values().cloned().collect();
        resources.sort_by(|a, b| a.uri.cmp(&b.uri));
        resources
    }

    /// Dispatches an action to the filesystem engine. Search/read/list on
    /// paths without a registered root fail fast rather than returning
    /// empty results.
    pub async fn invoke(&self, action: &Action) -> CoreResult<ActionOutcome> {
        Ok(self.paths.handle_action(action).await?)
    }

    /// Per-root index summaries.
    pub async fn index_status(&self) -> Vec<RootStatus> {
        self.paths.status().await
    }

    /// Subscribes to coalesced change ticks; re-read [`Self::all`] on each.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notifier.subscribe()
    }

    pub fn path_registry(&self) -> &Arc<PathRegistry> {
        &self.paths
    }

    async fn apply_add(&self, resource: Resource) -> CoreResult<()> {
        if self.resources.read().await.contains_key(&resource.uri) {
            return Ok(());
        }
        if resource.is_filesystem_backed() {
            let path = resource.fs_path().ok_or_else(|| {
                CoreError::InvalidInput(format!(
                    "resource {} is not a file:// URI",
                    resource.uri
                ))
            })?;
            self.paths.register(path, None).await?;
        }
        self.store.put(&resource).await?;
        self.resources
            .write()
            .await
            .insert(resource.uri.clone(), resource);
        Ok(())
    }

    /// Drains the deferred-add queue while the operation lock is held.
    ///
    /// Non-filesystem resources go first (cheap map+store writes), then
    /// filesystem resources grouped by registration root so each new
    /// directory is registered at most once per drain. One coalesced
    /// notification covers the whole drain.
    async fn drain_pending(&self) {
        loop {
            let batch: Vec<Resource> = std::mem::take(&mut *self.pending.lock());
            if batch.is_empty() {
                return;
            }

            let (fs_backed, plain): (Vec<Resource>, Vec<Resource>) = batch
                .into_iter()
                .partition(Resource::is_filesystem_backed);

            let mut applied = 0usize;
            for resource in plain {
                match self.apply_add(resource).await {
                    Ok(()) => applied += 1,
                    Err(error) => tracing::warn!(%error, "deferred add failed"),
                }
            }

            let mut groups: HashMap<PathBuf, Vec<Resource>> = HashMap::new();
            for resource in fs_backed {
                let root = resource.registration_root().unwrap_or_default();
                groups.entry(root).or_default().push(resource);
            }
            for (_root, group) in groups {
                for resource in group {
                    match self.apply_add(resource).await {
                        Ok(()) => applied += 1,
                        Err(error) => tracing::warn!(%error, "deferred add failed"),
                    }
                }
            }

            if applied > 0 {
                self.notifier.mark();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryResourceStore;
    use serde_json::json;
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;
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

    fn registry_with(store: SharedStore) -> ResourceRegistry {
        let config = CoworkConfig {
            debounce_ms: 10,
            ..CoworkConfig::default()
        };
        ResourceRegistry::new(store, &config)
    }

    fn memory_registry() -> ResourceRegistry {
        registry_with(Arc::new(MemoryResourceStore::new()))
    }

    #[tokio::test]
    async fn add_is_idempotent_by_uri() {
        let dir = tempdir().expect("tempdir");
        write_file(dir.path(), "a.txt", "a");

        let registry = memory_registry();
        let resource = Resource::directory(dir.path());
        registry.add(resource.clone()).await.expect("add");
        registry.add(resource).await.expect("add again");

        assert_eq!(registry.all().await.len(), 1);
        assert_eq!(registry.path_registry().root_count().await, 1);
    }

    #[tokio::test]
    async fn concurrent_adds_under_one_parent_register_once() {
        let dir = tempdir().expect("tempdir");
        let a = write_file(dir.path(), "a.txt", "alpha");
        let b = write_file(dir.path(), "b.txt", "beta");
        let c = write_file(dir.path(), "c.txt", "gamma");

        let registry = memory_registry();
        let (ra, rb, rc) = tokio::join!(
            registry.add(Resource::file(&a)),
            registry.add(Resource::file(&b)),
            registry.add(Resource::file(&c)),
        );
        ra.expect("a");
        rb.expect("b");
        rc.expect("c");

        assert_eq!(registry.all().await.len(), 3, "no lost update");
        assert_eq!(
            registry.path_registry().root_count().await,
            1,
            "exactly one directory registration"
        );

        let status = registry.index_status().await;
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].entries, 3, "no duplicate indexing");
    }

    #[tokio::test]
    async fn remove_directory_resource_drops_its_root() {
        let dir = tempdir().expect("tempdir");
        write_file(dir.path(), "a.txt", "a");

        let registry = memory_registry();
        let resource = Resource::directory(dir.path());
        let uri = resource.uri.clone();
        registry.add(resource).await.expect("add");
        assert_eq!(registry.path_registry().root_count().await, 1);

        registry.remove(&uri).await.expect("remove");
        assert!(registry.all().await.is_empty());
        assert_eq!(registry.path_registry().root_count().await, 0);

        // Unknown URI removes are a no-op.
        registry.remove(&uri).await.expect("remove again");
    }

    #[tokio::test]
    async fn remove_single_file_resource_keeps_sibling_roots() {
        let dir = tempdir().expect("tempdir");
        let a = write_file(dir.path(), "a.txt", "alpha");
        let b = write_file(dir.path(), "b.txt", "beta");

        let registry = memory_registry();
        let resource_a = Resource::file(&a);
        let uri_a = resource_a.uri.clone();
        registry.add(resource_a).await.expect("add a");
        registry.add(Resource::file(&b)).await.expect("add b");
        assert_eq!(registry.path_registry().root_count().await, 1);

        registry.remove(&uri_a).await.expect("remove a");
        // The shared parent root survives for the sibling resource.
        assert_eq!(registry.path_registry().root_count().await, 1);
        assert_eq!(registry.all().await.len(), 1);
    }

    #[tokio::test]
    async fn restart_round_trip_restores_and_reindexes() {
        let dir = tempdir().expect("tempdir");
        write_file(dir.path(), "findme.md", "needle content");

        let store: SharedStore = Arc::new(MemoryResourceStore::new());
        let registry = registry_with(store.clone());
        let resource = Resource::directory(dir.path());
        let uri = resource.uri.clone();
        registry.add(resource).await.expect("add");

        // Simulated restart: a fresh registry over the same store.
        let restarted = registry_with(store);
        restarted.load().await.expect("load");

        let all = restarted.all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].uri, uri);

        let outcome = restarted
            .invoke(&Action::new(uri, "search", json!({ "query": "needle" })))
            .await
            .expect("search after restart");
        let ActionOutcome::Entries(hits) = outcome else {
            panic!("expected entries");
        };
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "findme.md");
    }

    #[tokio::test]
    async fn non_filesystem_resources_skip_the_path_registry() {
        let registry = memory_registry();
        let resource = Resource {
            uri: "https://example.com/docs".to_string(),
            name: "docs".to_string(),
            description: String::new(),
            kind: crate::resource::ResourceKind::Website,
            icons: Vec::new(),
            actions: HashMap::new(),
        };
        registry.add(resource).await.expect("add");

        assert_eq!(registry.all().await.len(), 1);
        assert_eq!(registry.path_registry().root_count().await, 0);
    }
}
