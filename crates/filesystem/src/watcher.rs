//! Change watching for registered directory roots.
//!
//! Wraps the platform watcher from `notify` and normalizes its raw events
//! into `add | change | unlink` with root-relative paths. Events are shipped
//! over a channel to a forwarding task that applies them to the owning
//! `RootIndex`; watcher callbacks never touch index state directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{ModifyKind, RenameMode};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::{FilesystemError, Result};
use crate::index::{relative_path_is_ignored, RootIndex};
use crate::types::{ChangeEvent, ChangeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Stopped,
    Starting,
    Watching,
}

/// Watches one directory root. At most one underlying watch is live per
/// instance; `start` on an already-watching instance restarts cleanly.
pub struct ChangeWatcher {
    root: PathBuf,
    state: WatchState,
    watcher: Option<RecommendedWatcher>,
    forward_task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ChangeWatcher {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ChangeWatcher")
            .field("root", &self.root)
            .field("state", &self.state)
            .finish()
    }
}

impl ChangeWatcher {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            state: WatchState::Stopped,
            watcher: None,
            forward_task: None,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Starts watching the root and forwarding events into `index`.
    ///
    /// Idempotent: when already watching, the existing watch is stopped
    /// first so repeated calls cannot leak platform watches. Must be called
    /// from within a tokio runtime.
    pub fn start(&mut self, index: Arc<Mutex<RootIndex>>) -> Result<()> {
        if self.state == WatchState::Watching {
            self.close();
        }
        self.state = WatchState::Starting;

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ChangeEvent>();
        let callback_root = self.root.clone();
        let mut watcher = recommended_watcher(move |result: notify::Result<Event>| match result {
            Ok(event) => {
                for change in normalize_event(&callback_root, &event) {
                    let _ = event_tx.send(change);
                }
            }
            Err(error) => {
                log::warn!("watch error for {}: {error}", callback_root.display());
            }
        })
        .map_err(|error| {
            self.state = WatchState::Stopped;
            FilesystemError::Internal(format!(
                "failed to create watcher for {}: {error}",
                self.root.display()
            ))
        })?;

        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|error| {
                self.state = WatchState::Stopped;
                FilesystemError::Internal(format!(
                    "failed to watch {}: {error}",
                    self.root.display()
                ))
            })?;

        self.forward_task = Some(tokio::spawn(async move {
            while let Some(change) = event_rx.recv().await {
                index.lock().await.handle_file_change(&change);
            }
        }));
        self.watcher = Some(watcher);
        self.state = WatchState::Watching;
        log::debug!("watching {}", self.root.display());
        Ok(())
    }

    /// Stops the underlying watch and the forwarding task. Never fails;
    /// cleanup problems are logged only. Safe to call in any state.
    pub fn close(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(error) = watcher.unwatch(&self.root) {
                log::warn!("failed to unwatch {}: {error}", self.root.display());
            }
        }
        if let Some(task) = self.forward_task.take() {
            task.abort();
        }
        self.state = WatchState::Stopped;
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

/// Normalizes a raw watcher event into zero or more change events with
/// paths relative to the root. Events for the root itself, for paths
/// outside it, and for hidden/ignored paths are dropped.
pub fn normalize_event(root: &Path, event: &Event) -> Vec<ChangeEvent> {
    let mut changes = Vec::new();

    let mut push = |path: &Path, kind: ChangeKind| {
        let Ok(relative) = path.strip_prefix(root) else {
            return;
        };
        if relative.as_os_str().is_empty() || relative_path_is_ignored(relative) {
            return;
        }
        changes.push(ChangeEvent {
            kind,
            relative_path: relative.to_path_buf(),
        });
    };

    match &event.kind {
        EventKind::Create(_) => {
            for path in &event.paths {
                push(path, ChangeKind::Add);
            }
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                push(path, ChangeKind::Unlink);
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            for path in &event.paths {
                push(path, ChangeKind::Unlink);
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            for path in &event.paths {
                push(path, ChangeKind::Add);
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if let [from, to] = event.paths.as_slice() {
                push(from, ChangeKind::Unlink);
                push(to, ChangeKind::Add);
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            // Ambiguous rename: resolve by what is on disk now.
            for path in &event.paths {
                let kind = if path.exists() {
                    ChangeKind::Add
                } else {
                    ChangeKind::Unlink
                };
                push(path, kind);
            }
        }
        EventKind::Modify(_) => {
            for path in &event.paths {
                push(path, ChangeKind::Change);
            }
        }
        EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, paths: Vec<PathBuf>) -> Event {
        let mut event = Event::new(kind);
        event.paths = paths;
        event
    }

    #[test]
    fn create_and_remove_map_to_add_and_unlink() {
        let root = Path::new("/watched");

        let added = normalize_event(
            root,
            &event(
                EventKind::Create(CreateKind::File),
                vec![root.join("sub/new.txt")],
            ),
        );
        assert_eq!(
            added,
            vec![ChangeEvent {
                kind: ChangeKind::Add,
                relative_path: PathBuf::from("sub/new.txt"),
            }]
        );

        let removed = normalize_event(
            root,
            &event(
                EventKind::Remove(RemoveKind::File),
                vec![root.join("old.txt")],
            ),
        );
        assert_eq!(removed[0].kind, ChangeKind::Unlink);
    }

    #[test]
    fn rename_both_emits_unlink_then_add() {
        let root = Path::new("/watched");
        let changes = normalize_event(
            root,
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                vec![root.join("before.txt"), root.join("after.txt")],
            ),
        );

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].kind, ChangeKind::Unlink);
        assert_eq!(changes[0].relative_path, PathBuf::from("before.txt"));
        assert_eq!(changes[1].kind, ChangeKind::Add);
        assert_eq!(changes[1].relative_path, PathBuf::from("after.txt"));
    }

    #[test]
    fn events_outside_root_and_ignored_paths_are_dropped() {
        let root = Path::new("/watched");

        let outside = normalize_event(
            root,
            &event(
                EventKind::Create(CreateKind::File),
                vec![PathBuf::from("/elsewhere/file.txt")],
            ),
        );
        assert!(outside.is_empty());

        let ignored = normalize_event(
            root,
            &event(
                EventKind::Create(CreateKind::File),
                vec![root.join("node_modules/pkg/index.js"), root.join(".git/HEAD")],
            ),
        );
        assert!(ignored.is_empty());

        let on_root = normalize_event(
            root,
            &event(EventKind::Modify(ModifyKind::Any), vec![root.to_path_buf()]),
        );
        assert!(on_root.is_empty());
    }

    #[test]
    fn close_without_start_is_a_no_op() {
        let mut watcher = ChangeWatcher::new(PathBuf::from("/nonexistent"));
        watcher.close();
        watcher.close();
        assert_eq!(watcher.state(), WatchState::Stopped);
    }
}
