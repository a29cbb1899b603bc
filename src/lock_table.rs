//! In-process exclusion for cache paths
//!
//! Serializes logical operations that would create or copy the same cache
//! path within one running instance. Nothing here is visible to other
//! processes; several instances sharing one cache directory need external
//! coordination.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::trace;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Map from cache path to the wakeup handle of its current holder.
/// A path with no entry is free.
pub struct ProcessLockTable {
    entries: Mutex<HashMap<PathBuf, Arc<Notify>>>,
    poll_interval: Duration,
}

impl ProcessLockTable {
    /// Create an empty table. Waiters are woken on release and, failing
    /// that, re-check every `poll_interval` (at least one millisecond).
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    /// Wait until `path` is free, then hold it
    ///
    /// The returned guard releases the path when dropped, including when
    /// the owning future is cancelled or fails part-way. Waiters are not
    /// queued: whichever re-checks first after a release wins.
    pub async fn acquire(&self, path: &Path) -> PathLock<'_> {
        loop {
            let notify: Arc<Notify>;
            let released;
            {
                let mut entries = self.entries();
                match entries.get(path) {
                    Some(holder) => notify = Arc::clone(holder),
                    None => {
                        entries.insert(path.to_path_buf(), Arc::new(Notify::new()));
                        trace!("Spin-lock acquired: {}", path.display());
                        return PathLock {
                            table: self,
                            path: path.to_path_buf(),
                        };
                    }
                }
                // Registered before the map lock is dropped so a release in
                // between is not missed
                released = notify.notified();
            }
            let _ = tokio::time::timeout(self.poll_interval, released).await;
        }
    }

    /// Free `path` for the next acquirer. There is no ownership check.
    pub fn release(&self, path: &Path) {
        let holder = self.entries().remove(path);
        if let Some(notify) = holder {
            trace!("Spin-lock freed: {}", path.display());
            notify.notify_waiters();
        }
    }

    /// Whether `path` is currently held
    pub fn is_held(&self, path: &Path) -> bool {
        self.entries().contains_key(path)
    }

    /// Number of held paths
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// True when no path is held
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<Notify>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds a path in a [`ProcessLockTable`] until dropped
#[must_use = "the path is released as soon as the guard is dropped"]
pub struct PathLock<'a> {
    table: &'a ProcessLockTable,
    path: PathBuf,
}

impl PathLock<'_> {
    /// The held path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PathLock<'_> {
    fn drop(&mut self) {
        self.table.release(&self.path);
    }
}
