//! File-change detection for cached assets.
//!
//! Thin session wrapper over the `notify` watcher. The backend delivers
//! events on its own thread; the handler there only bumps atomic counters
//! registered for the changed path. All cache mutation stays on the owner's
//! update thread, which polls [`WatchSession::poll_changed`] once per frame.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use ember_core::alloc::HashMap;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{AssetError, AssetResult};

type PathMap = HashMap<PathBuf, Vec<Weak<AtomicU32>>>;

/// State shared with the backend's event thread.
#[derive(Default)]
struct WatchShared {
    /// Canonical file path -> version counters of the assets behind it.
    paths: Mutex<PathMap>,
    /// Count of change deliveries that hit a registered path.
    changes: AtomicU64,
}

fn lock_paths(shared: &WatchShared) -> MutexGuard<'_, PathMap> {
    shared.paths.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registration of one file with a [`WatchSession`]. Unregisters on drop.
pub struct WatchHandle {
    path: PathBuf,
    counter: Weak<AtomicU32>,
    shared: Weak<WatchShared>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut paths = lock_paths(&shared);
        if let Some(counters) = paths.get_mut(&self.path) {
            counters.retain(|c| !Weak::ptr_eq(c, &self.counter));
            if counters.is_empty() {
                paths.remove(&self.path);
            }
        }
    }
}

/// One watch session: a backend watcher plus the path registrations made
/// through it.
pub struct WatchSession {
    watcher: RecommendedWatcher,
    shared: Arc<WatchShared>,
    watched_dirs: Vec<PathBuf>,
    seen_changes: u64,
}

impl WatchSession {
    pub fn new() -> AssetResult<Self> {
        let shared = Arc::new(WatchShared::default());
        let handler_shared = Arc::clone(&shared);

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else { return };
            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                return;
            }

            // Runs on the backend thread: bump counters, touch nothing else.
            let mut fired = false;
            let mut paths = lock_paths(&handler_shared);
            for path in &event.paths {
                if let Some(counters) = paths.get_mut(path) {
                    counters.retain(|counter| match counter.upgrade() {
                        Some(counter) => {
                            counter.fetch_add(1, Ordering::Release);
                            fired = true;
                            true
                        }
                        None => false,
                    });
                }
            }
            drop(paths);

            if fired {
                handler_shared.changes.fetch_add(1, Ordering::Release);
            }
        })
        .map_err(|err| AssetError::WatchFailed {
            path: PathBuf::new(),
            message: err.to_string(),
        })?;

        Ok(Self {
            watcher,
            shared,
            watched_dirs: Vec::new(),
            seen_changes: 0,
        })
    }

    /// Start watching `path`, bumping `counter` on every change to it.
    ///
    /// The registration is keyed by the canonicalized absolute location of
    /// the file, so events arriving under the resolved path still match.
    pub fn watch(&mut self, path: &Path, counter: &Arc<AtomicU32>) -> AssetResult<WatchHandle> {
        let canonical = canonical_watch_path(path);
        let dir = canonical
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| AssetError::WatchFailed {
                path: canonical.clone(),
                message: "path has no parent directory".to_string(),
            })?;

        if !self.watched_dirs.contains(&dir) {
            self.watcher
                .watch(&dir, RecursiveMode::NonRecursive)
                .map_err(|err| AssetError::WatchFailed {
                    path: canonical.clone(),
                    message: err.to_string(),
                })?;
            self.watched_dirs.push(dir);
        }

        lock_paths(&self.shared)
            .entry(canonical.clone())
            .or_default()
            .push(Arc::downgrade(counter));

        Ok(WatchHandle {
            path: canonical,
            counter: Arc::downgrade(counter),
            shared: Arc::downgrade(&self.shared),
        })
    }

    /// Re-arm an existing registration with the current counter binding.
    /// Used after a code swap replaces the update-loop side of the session.
    pub fn rebind(&self, handle: &mut WatchHandle, counter: &Arc<AtomicU32>) {
        let mut paths = lock_paths(&self.shared);
        let counters = paths.entry(handle.path.clone()).or_default();
        counters.retain(|c| !Weak::ptr_eq(c, &handle.counter));
        counters.push(Arc::downgrade(counter));
        handle.counter = Arc::downgrade(counter);
    }

    /// Non-blocking: did any registered file change since the last poll?
    pub fn poll_changed(&mut self) -> bool {
        let total = self.shared.changes.load(Ordering::Acquire);
        let changed = total != self.seen_changes;
        self.seen_changes = total;
        changed
    }
}

/// Absolute, symlink-resolved location of `path`. Falls back to the plain
/// absolute form when the file does not exist yet.
fn canonical_watch_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    std::fs::canonicalize(&absolute).unwrap_or(absolute)
}
