//! File system watcher for detecting changes under a project root.
//!
//! Uses FSEvents on macOS and inotify on Linux. Raw OS bursts are coalesced
//! by a short native debounce before they are pushed onto the caller's
//! queue; the longer, per-project trailing debounce happens in the consumer.

use crate::IndexerError;
use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// File change type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    /// Renamed or moved; emitted for both the old and the new path
    Moved,
}

/// A file system change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Path to the changed file or directory
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub is_dir: bool,
    /// When the change was observed
    pub at: Instant,
}

impl FileChange {
    /// A change observed now.
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind, is_dir: bool) -> Self {
        Self {
            path: path.into(),
            kind,
            is_dir,
            at: Instant::now(),
        }
    }
}

/// Options for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    /// Native debounce applied before events are delivered
    pub debounce_duration: Duration,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(100),
        }
    }
}

/// Recursive watcher over one directory. Dropping it stops notification.
pub struct FileWatcher {
    path: PathBuf,
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl FileWatcher {
    /// Start watching `path` recursively, pushing changes onto `tx`.
    pub fn watch(
        path: &Path,
        options: WatcherOptions,
        tx: mpsc::Sender<FileChange>,
    ) -> Result<Self, IndexerError> {
        let path = path
            .canonicalize()
            .map_err(|_| IndexerError::NotFound(path.to_path_buf()))?;

        let mut debouncer = new_debouncer(
            options.debounce_duration,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in events {
                        for change in convert_event(&event.event) {
                            if let Err(e) = tx.blocking_send(change) {
                                error!(error = %e, "Failed to send change event");
                                return;
                            }
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        warn!(error = %e, "Watcher error");
                    }
                }
            },
        )
        .map_err(|e| IndexerError::Watcher(e.to_string()))?;

        debouncer
            .watch(&path, RecursiveMode::Recursive)
            .map_err(|e: notify::Error| IndexerError::Watcher(e.to_string()))?;

        info!(path = ?path, "Started watching");

        Ok(Self {
            path,
            _debouncer: debouncer,
        })
    }

    /// The watched directory, canonicalized.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher").field("path", &self.path).finish()
    }
}

/// Convert a notify Event into one change per affected path.
fn convert_event(event: &Event) -> Vec<FileChange> {
    let (kind, dir_hint) = match &event.kind {
        EventKind::Create(create) => (ChangeKind::Created, *create == CreateKind::Folder),
        EventKind::Modify(ModifyKind::Name(_)) => (ChangeKind::Moved, false),
        EventKind::Modify(_) => (ChangeKind::Modified, false),
        EventKind::Remove(remove) => (ChangeKind::Deleted, *remove == RemoveKind::Folder),
        EventKind::Any | EventKind::Access(_) | EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .iter()
        .map(|path| {
            let change = FileChange::new(path.clone(), kind, dir_hint || path.is_dir());
            debug!(
                path = ?change.path,
                kind = ?kind,
                is_dir = change.is_dir,
                "File change detected"
            );
            change
        })
        .collect()
}
