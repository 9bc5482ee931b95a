//! Root path registry.
//!
//! Maps registered root paths to their index/watcher pairs, enforces the
//! no-nested-roots invariant, and routes actions to the owning root.
//!
//! The conflict check and registration marker are taken under a synchronous
//! lock before the first await, so two concurrent `register` calls for
//! conflicting paths cannot both pass the check. A root becomes reachable
//! through the registry only after its scan has completed.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use crate::action::{
    file_uri_to_path, optional_string, required_string, Action, ActionOutcome,
};
use crate::error::{canonicalize_existing_path, FilesystemError, Result};
use crate::index::{IndexOptions, RootIndex};
use crate::types::{EntryKind, ReadPayload};
use crate::watcher::ChangeWatcher;

/// How long a single-file registration waits for a concurrent registration
/// of the same root to finish before giving up.
const IN_PROGRESS_WAIT: Duration = Duration::from_millis(20);
const IN_PROGRESS_RETRIES: usize = 250;

/// One registered root: its index and, for directory roots, its watcher.
pub struct RootRegistration {
    pub root: PathBuf,
    pub index: Arc<Mutex<RootIndex>>,
    watcher: Option<ChangeWatcher>,
}

impl std::fmt::Debug for RootRegistration {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RootRegistration")
            .field("root", &self.root)
            .field("watching", &self.watcher.is_some())
            .finish()
    }
}

/// Per-root summary for the product surface.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootStatus {
    pub root: PathBuf,
    pub entries: usize,
    pub errors: usize,
    pub watching: bool,
    pub skip_full_scan: bool,
}

#[derive(Debug, Default)]
pub struct PathRegistry {
    options: IndexOptions,
    /// Synchronous registration markers; checked and set before any await.
    registered_paths: parking_lot::Mutex<HashSet<PathBuf>>,
    /// Roots whose initial scan has not completed yet.
    indexing_in_progress: parking_lot::Mutex<HashSet<PathBuf>>,
    roots: RwLock<HashMap<PathBuf, RootRegistration>>,
}

enum RegisterMode {
    /// New root: marker taken, build index (and watcher for directories).
    Create,
    /// Root exists and a single file should join its index.
    Additive(PathBuf),
    /// Root exists; upgrade to a full scan if it was single-file only.
    Existing,
}

impl PathRegistry {
    pub fn new(options: IndexOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Registers a root path.
    ///
    /// A directory root is scanned recursively and watched for changes. When
    /// `single_file` is given (or `path` itself is a file), only that file
    /// is indexed into a root for its parent directory, without a watcher or
    /// full scan. Conflicting (nested) registrations are rejected; repeating
    /// a registration is a no-op. Returns the normalized root path.
    pub async fn register(&self, path: PathBuf, single_file: Option<PathBuf>) -> Result<PathBuf> {
        let mut root = canonicalize_existing_path(path);
        let mut single_file = single_file;

        if let Some(file) = single_file.take() {
            let file = if file.is_relative() { root.join(file) } else { file };
            let file = canonicalize_existing_path(file);
            if !file.starts_with(&root) {
                return Err(FilesystemError::InvalidInput(format!(
                    "{} is not under root {}",
                    file.display(),
                    root.display()
                )));
            }
            single_file = Some(file);
        } else {
            // A bare file path is an implicit single-file registration
            // against its parent directory.
            let metadata = fs::metadata(&root)?;
            if metadata.is_file() {
                let parent = root
                    .parent()
                    .ok_or_else(|| {
                        FilesystemError::InvalidInput(format!(
                            "file {} has no parent directory",
                            root.display()
                        ))
                    })?
                    .to_path_buf();
                single_file = Some(root);
                root = parent;
            }
        }

        // Conflict check and marker, synchronously before any await.
        let mode = {
            let mut registered = self.registered_paths.lock();
            if registered.contains(&root) {
                match single_file.take() {
                    Some(file) => RegisterMode::Additive(file),
                    None => RegisterMode::Existing,
                }
            } else {
                for existing in registered.iter() {
                    if root.starts_with(existing) || existing.starts_with(&root) {
                        return Err(FilesystemError::NestedRegistration(root));
                    }
                }
                registered.insert(root.clone());
                self.indexing_in_progress.lock().insert(root.clone());
                RegisterMode::Create
            }
        };

        match mode {
            RegisterMode::Create => {
                let built = self.build_registration(&root, single_file).await;
                self.indexing_in_progress.lock().remove(&root);
                match built {
                    Ok(registration) => {
                        self.roots.write().await.insert(root.clone(), registration);
                        Ok(root)
                    }
                    Err(error) => {
                        self.registered_paths.lock().remove(&root);
                        Err(error)
                    }
                }
            }
            RegisterMode::Additive(file) => {
                self.index_into_existing(&root, &file).await?;
                Ok(root)
            }
            RegisterMode::Existing => {
                self.upgrade_if_single_file(&root).await?;
                Ok(root)
            }
        }
    }

    async fn build_registration(
        &self,
        root: &Path,
        single_file: Option<PathBuf>,
    ) -> Result<RootRegistration> {
        if let Some(file) = single_file {
            let mut index = RootIndex::new(root.to_path_buf(), true, self.options);
            index.index_file(&file)?;
            return Ok(RootRegistration {
                root: root.to_path_buf(),
                index: Arc::new(Mutex::new(index)),
                watcher: None,
            });
        }

        let metadata = fs::metadata(root)?;
        if !metadata.is_dir() {
            return Err(FilesystemError::InvalidInput(format!(
                "not a directory: {}",
                root.display()
            )));
        }

        let mut index = RootIndex::new(root.to_path_buf(), false, self.options);
        let index = tokio::task::spawn_blocking(move || {
            index.initialize();
            index
        })
        .await
        .map_err(|error| FilesystemError::Internal(format!("index scan task failed: {error}")))?;
        let index = Arc::new(Mutex::new(index));

        // Watcher failure degrades to "no live updates"; the scan already
        // succeeded, so registration goes through.
        let mut watcher = ChangeWatcher::new(root.to_path_buf());
        let watcher = match watcher.start(index.clone()) {
            Ok(()) => Some(watcher),
            Err(error) => {
                log::warn!("live updates disabled for {}: {error}", root.display());
                None
            }
        };

        Ok(RootRegistration {
            root: root.to_path_buf(),
            index,
            watcher,
        })
    }

    /// Adds one file to an already registered root, waiting briefly if that
    /// root's initial scan is still in flight.
    async fn index_into_existing(&self, root: &Path, file: &Path) -> Result<()> {
        for _ in 0..IN_PROGRESS_RETRIES {
            {
                let roots = self.roots.read().await;
                if let Some(registration) = roots.get(root) {
                    let mut index = registration.index.lock().await;
                    if index.skip_full_scan() || index.get_file(file).is_none() {
                        index.index_file(file)?;
                    }
                    return Ok(());
                }
            }
            if !self.indexing_in_progress.lock().contains(root) {
                break;
            }
            tokio::time::sleep(IN_PROGRESS_WAIT).await;
        }
        Err(FilesystemError::NoIndexForPath(root.to_path_buf()))
    }

    /// Replaces a single-file registration of `root` with a full scan and a
    /// watcher. A fully scanned root is left untouched.
    async fn upgrade_if_single_file(&self, root: &Path) -> Result<()> {
        {
            let roots = self.roots.read().await;
            match roots.get(root) {
                Some(registration) => {
                    if !registration.index.lock().await.skip_full_scan() {
                        return Ok(());
                    }
                }
                None => {
                    // Marker exists but the root is not reachable yet: the
                    // initial scan is still in flight, so retrying is a no-op.
                    if self.indexing_in_progress.lock().contains(root) {
                        return Ok(());
                    }
                    return Err(FilesystemError::NoIndexForPath(root.to_path_buf()));
                }
            }
        }

        let mut scanned = RootIndex::new(root.to_path_buf(), false, self.options);
        let scanned = tokio::task::spawn_blocking(move || {
            scanned.initialize();
            scanned
        })
        .await
        .map_err(|error| FilesystemError::Internal(format!("index scan task failed: {error}")))?;

        let mut roots = self.roots.write().await;
        if let Some(registration) = roots.get_mut(root) {
            *registration.index.lock().await = scanned;
            if registration.watcher.is_none() {
                let mut watcher = ChangeWatcher::new(root.to_path_buf());
                match watcher.start(registration.index.clone()) {
                    Ok(()) => registration.watcher = Some(watcher),
                    Err(error) => {
                        log::warn!("live updates disabled for {}: {error}", root.display());
                    }
                }
            }
        }
        Ok(())
    }

    /// Discards the index and watcher for an exact root path. Unregistering
    /// a path that is not a root is a no-op. Returns the normalized path.
    pub async fn unregister(&self, path: PathBuf) -> Result<PathBuf> {
        let root = canonicalize_existing_path(path);
        if let Some(mut registration) = self.roots.write().await.remove(&root) {
            if let Some(watcher) = registration.watcher.as_mut() {
                watcher.close();
            }
            self.registered_paths.lock().remove(&root);
            log::info!("unregistered root {}", root.display());
        }
        Ok(root)
    }

    /// Resolves a URI path to its owning registered root: an exact root
    /// match first, otherwise the parent directory of a file path.
    async fn resolve_root(&self, target: &Path) -> Result<PathBuf> {
        let roots = self.roots.read().await;
        if roots.contains_key(target) {
            return Ok(target.to_path_buf());
        }
        if let Some(parent) = target.parent() {
            if roots.contains_key(parent) {
                return Ok(parent.to_path_buf());
            }
        }
        Err(FilesystemError::NoIndexForPath(target.to_path_buf()))
    }

    /// Dispatches one action to the root addressed by its URI.
    pub async fn handle_action(&self, action: &Action) -> Result<ActionOutcome> {
        match action.action_id.as_str() {
            "search" => {
                let query = required_string(&action.args, "query")?;
                let root = self.resolve_target(&action.uri).await?;
                let roots = self.roots.read().await;
                let registration = roots
                    .get(&root)
                    .ok_or_else(|| FilesystemError::NoIndexForPath(root.clone()))?;
                let index = registration.index.lock().await;
                Ok(ActionOutcome::Entries(index.search(&query)))
            }
            "list" => {
                let pattern = optional_string(&action.args, "pattern");
                let root = self.resolve_target(&action.uri).await?;
                let roots = self.roots.read().await;
                let registration = roots
                    .get(&root)
                    .ok_or_else(|| FilesystemError::NoIndexForPath(root.clone()))?;
                let index = registration.index.lock().await;
                Ok(ActionOutcome::Entries(index.list_files(pattern.as_deref())))
            }
            "read" => {
                let requested = required_string(&action.args, "path")?;
                let root = self.resolve_target(&action.uri).await?;
                let payload = self.read_entry(&root, Path::new(&requested)).await?;
                Ok(ActionOutcome::Content(payload))
            }
            "register" => {
                let path = required_string(&action.args, "path")?;
                let single_file = optional_string(&action.args, "singleFileToIndex");
                let root = self
                    .register(PathBuf::from(path), single_file.map(PathBuf::from))
                    .await?;
                Ok(ActionOutcome::Path(root))
            }
            "unregister" => {
                let path = required_string(&action.args, "path")?;
                let root = self.unregister(PathBuf::from(path)).await?;
                Ok(ActionOutcome::Path(root))
            }
            other => Err(FilesystemError::Unsupported(other.to_string())),
        }
    }

    async fn resolve_target(&self, uri: &str) -> Result<PathBuf> {
        let target = canonicalize_existing_path(file_uri_to_path(uri)?);
        self.resolve_root(&target).await
    }

    /// Resolves and reads one entry: text content for text files, structured
    /// binary payloads for images and generic binaries, raw document bytes
    /// for rich-viewer rendering.
    async fn read_entry(&self, root: &Path, requested: &Path) -> Result<ReadPayload> {
        let roots = self.roots.read().await;
        let registration = roots
            .get(root)
            .ok_or_else(|| FilesystemError::NoIndexForPath(root.to_path_buf()))?;
        let mut index = registration.index.lock().await;

        let absolute = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            root.join(requested)
        };

        let found = index.get_file_async(&absolute).await.cloned();
        let entry = match found {
            Some(entry) => entry,
            None => index
                .resolve_entry(requested)
                .cloned()
                .ok_or_else(|| FilesystemError::FileNotFound(requested.to_path_buf()))?,
        };
        drop(index);
        drop(roots);

        match entry.kind {
            EntryKind::Text => {
                let content = match entry.content {
                    Some(content) => content,
                    None => tokio::fs::read_to_string(&entry.path).await?,
                };
                Ok(ReadPayload::Text(content))
            }
            EntryKind::Image => {
                let data = match entry.binary_data {
                    Some(data) => data,
                    None => tokio::fs::read(&entry.path).await?,
                };
                Ok(ReadPayload::Image {
                    data,
                    filename: entry.name,
                    mime_type: entry.mime_type,
                })
            }
            EntryKind::Document => {
                let data = match entry.binary_data {
                    Some(data) => data,
                    None => tokio::fs::read(&entry.path).await?,
                };
                Ok(ReadPayload::Document {
                    data,
                    filename: entry.name,
                    mime_type: entry.mime_type,
                })
            }
            EntryKind::Binary => {
                let data = tokio::fs::read(&entry.path).await?;
                Ok(ReadPayload::Binary {
                    data,
                    filename: entry.name,
                    mime_type: entry.mime_type,
                })
            }
        }
    }

    /// Per-root summaries for the product surface.
    pub async fn status(&self) -> Vec<RootStatus> {
        let roots = self.roots.read().await;
        let mut statuses = Vec::with_capacity(roots.len());
        for registration in roots.values() {
            let index = registration.index.lock().await;
            statuses.push(RootStatus {
                root: registration.root.clone(),
                entries: index.entry_count(),
                errors: index.error_count(),
                watching: registration.watcher.is_some(),
                skip_full_scan: index.skip_full_scan(),
            });
        }
        statuses.sort_by(|a, b| a.root.cmp(&b.root));
        statuses
    }

    /// Number of registered roots.
    pub async fn root_count(&self) -> usize {
        self.roots.read().await.len()
    }

    /// True when `path` is registered as a root.
    pub async fn is_registered(&self, path: &Path) -> bool {
        self.roots.read().await.contains_key(path)
    }
}
