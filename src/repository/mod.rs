//! Repository acquisition
//!
//! Turns a (repository address, commit-ish) request into a snapshot
//! directory holding that commit's tree without version control metadata.
//! The snapshot is returned cache-locked and stays out of purges until the
//! caller hands it back through [`Repository::release`].
//!
//! Every step checks on-disk state before mutating it, so a request that
//! failed part-way leaves nothing to roll back: the next request for the
//! same key repairs whatever was left. A snapshot is built under a staging
//! name and renamed into place only after its metadata is stripped, so a
//! snapshot directory under its final name is always complete.
//!
//! | Entry    | Missing        | Partial                        | Complete        |
//! |----------|----------------|--------------------------------|-----------------|
//! | Mirror   | cloned         | no `.git`: removed, cloned     | touched         |
//! | Snapshot | staged, synced | staging left: removed, redone  | touched, reused |

pub mod key;

pub use key::{commitish_component, resolve_mirror_path, resolve_snapshot_path, RepoKey};

use crate::cache::CacheStore;
use crate::config::schema::CacheConfig;
use crate::error::{RepoCacheError, RepoCacheResult};
use crate::git::VersionControl;
use crate::lock_table::ProcessLockTable;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Version control metadata directory
pub const GIT_DIR: &str = ".git";

/// Appended to a snapshot name while it is being built
pub const STAGING_SUFFIX: &str = "~staging";

/// On-disk state of a mirror or snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Missing,
    Partial,
    Complete,
}

impl EntryState {
    /// A mirror is complete once it is a working copy
    pub fn of_mirror(path: &Path) -> Self {
        match (path.is_dir(), path.join(GIT_DIR).is_dir()) {
            (false, _) => Self::Missing,
            (true, false) => Self::Partial,
            (true, true) => Self::Complete,
        }
    }

    /// A snapshot is complete once it sits under its final name without
    /// metadata. A leftover staging directory makes a missing snapshot
    /// partial.
    pub fn of_snapshot(path: &Path) -> Self {
        match (path.is_dir(), path.join(GIT_DIR).exists()) {
            (true, false) => Self::Complete,
            (true, true) => Self::Partial,
            (false, _) if staging_path(path).exists() => Self::Partial,
            (false, _) => Self::Missing,
        }
    }
}

/// Where the snapshot at `snapshot` is built before it is renamed into place
pub fn staging_path(snapshot: &Path) -> PathBuf {
    let mut name = snapshot.file_name().unwrap_or_default().to_os_string();
    name.push(STAGING_SUFFIX);
    snapshot.with_file_name(name)
}

/// Acquisition orchestrator over the repositories and commitishes pools
pub struct Repository {
    cache: Arc<CacheStore>,
    locks: Arc<ProcessLockTable>,
    vcs: Arc<dyn VersionControl>,
    mirrors: PathBuf,
    snapshots: PathBuf,
}

impl Repository {
    /// Create an orchestrator placing mirrors under `mirrors` and snapshots
    /// under `snapshots`
    pub fn new(
        cache: Arc<CacheStore>,
        locks: Arc<ProcessLockTable>,
        vcs: Arc<dyn VersionControl>,
        mirrors: impl Into<PathBuf>,
        snapshots: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cache,
            locks,
            vcs,
            mirrors: mirrors.into(),
            snapshots: snapshots.into(),
        }
    }

    /// Create an orchestrator with its own lock table from configuration
    pub fn from_config(
        config: &CacheConfig,
        cache: Arc<CacheStore>,
        vcs: Arc<dyn VersionControl>,
    ) -> Self {
        Self::new(
            cache,
            Arc::new(ProcessLockTable::new(config.lock_poll_interval())),
            vcs,
            &config.repositories,
            &config.commitishes,
        )
    }

    /// Mirror location for a repository address
    pub fn mirror_path(&self, url: &str) -> RepoCacheResult<PathBuf> {
        resolve_mirror_path(&self.mirrors, url)
    }

    /// Snapshot location for a repository address and commit-ish
    pub fn snapshot_path(&self, url: &str, commitish: &str) -> RepoCacheResult<PathBuf> {
        resolve_snapshot_path(&self.snapshots, url, commitish)
    }

    /// Produce a cache-locked snapshot of `url` at `commitish`
    ///
    /// `key` is the deploy key the git commands run under. Concurrent
    /// requests for the same repository and commit-ish in this process
    /// collapse into a single clone and checkout; all of them get the same
    /// path back.
    pub async fn fetch(
        &self,
        key: &Path,
        url: &str,
        commitish: &str,
    ) -> RepoCacheResult<PathBuf> {
        let span = info_span!("acquire", id = %Uuid::new_v4(), repo = %url, commitish);
        self.acquire(key, url, commitish).instrument(span).await
    }

    /// Hand back a snapshot returned by [`Repository::fetch`]
    pub async fn release(&self, snapshot: &Path) -> RepoCacheResult<()> {
        debug!("Releasing {}", snapshot.display());
        self.cache.unlock(snapshot).await
    }

    async fn acquire(&self, key: &Path, url: &str, commitish: &str) -> RepoCacheResult<PathBuf> {
        let mirror = self.mirror_path(url)?;
        let snapshot = self.snapshot_path(url, commitish)?;

        if !self.locks.is_held(&snapshot) && Self::is_cached(&mirror, &snapshot) {
            if self.reuse(&mirror, &snapshot).await? {
                debug!("Cache hit: {}", snapshot.display());
                return Ok(snapshot);
            }
            debug!("Cache entry vanished, rebuilding {}", snapshot.display());
        }

        if !matches!(fs::try_exists(key).await, Ok(true)) {
            return Err(RepoCacheError::MissingCredential(key.to_path_buf()));
        }

        let _mirror_lock = self.locks.acquire(&mirror).await;
        let _snapshot_lock = self.locks.acquire(&snapshot).await;

        if Self::is_cached(&mirror, &snapshot) && self.reuse(&mirror, &snapshot).await? {
            debug!("Cache hit after wait: {}", snapshot.display());
            return Ok(snapshot);
        }

        info!("Fetching {} at {}", url, commitish);
        self.ensure_mirror(key, url, &mirror).await?;

        let staged = self.materialize(&mirror, &snapshot).await;
        let unlocked = self.cache.unlock(&mirror).await;
        let staging = match staged? {
            Some(staging) => staging,
            None => {
                unlocked?;
                self.cache.touch(&snapshot).await?;
                self.cache.lock(&snapshot).await?;
                info!("Snapshot ready: {}", snapshot.display());
                return Ok(snapshot);
            }
        };
        unlocked?;
        self.cache.lock(&staging).await?;

        self.synchronize(key, &mirror, &staging, commitish).await?;
        self.sanitize(&staging).await?;
        self.cache.rename(&staging, &snapshot).await?;

        info!("Snapshot ready: {}", snapshot.display());
        Ok(snapshot)
    }

    fn is_cached(mirror: &Path, snapshot: &Path) -> bool {
        EntryState::of_mirror(mirror) == EntryState::Complete
            && EntryState::of_snapshot(snapshot) == EntryState::Complete
    }

    /// Touch and lock a cached mirror and snapshot. Returns `false` if either
    /// was removed in the meantime, e.g. by a concurrent purge.
    async fn reuse(&self, mirror: &Path, snapshot: &Path) -> RepoCacheResult<bool> {
        let reused = async {
            self.cache.touch(mirror).await?;
            self.cache.touch(snapshot).await?;
            self.cache.lock(snapshot).await
        };
        match reused.await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Make sure a working copy exists at `mirror` and leave it cache-locked
    async fn ensure_mirror(&self, key: &Path, url: &str, mirror: &Path) -> RepoCacheResult<()> {
        match EntryState::of_mirror(mirror) {
            EntryState::Complete => {
                debug!("Reusing mirror {}", mirror.display());
                self.cache.touch(mirror).await?;
            }
            state => {
                if state == EntryState::Partial {
                    warn!("Removing incomplete mirror {}", mirror.display());
                    self.cache.remove(mirror).await?;
                }
                if let Some(parent) = mirror.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|e| RepoCacheError::cache("create", parent, e))?;
                }
                info!("Cloning {} into {}", url, mirror.display());
                self.vcs.clone_repository(key, url, mirror).await?;
            }
        }
        self.cache.lock(mirror).await
    }

    /// Copy the mirror into the snapshot's staging directory and return it.
    /// Returns `None` when the snapshot was already complete and nothing was
    /// copied.
    async fn materialize(
        &self,
        mirror: &Path,
        snapshot: &Path,
    ) -> RepoCacheResult<Option<PathBuf>> {
        let staging = staging_path(snapshot);
        match EntryState::of_snapshot(snapshot) {
            EntryState::Complete => {
                debug!("Snapshot already complete: {}", snapshot.display());
                return Ok(None);
            }
            EntryState::Partial => {
                warn!("Removing incomplete snapshot {}", snapshot.display());
                self.cache.remove(snapshot).await?;
                self.cache.remove(&staging).await?;
            }
            EntryState::Missing => {}
        }
        self.cache.copy(mirror, &staging).await?;
        Ok(Some(staging))
    }

    /// Bring the snapshot to `commitish` unless the mirror is already there
    async fn synchronize(
        &self,
        key: &Path,
        mirror: &Path,
        snapshot: &Path,
        commitish: &str,
    ) -> RepoCacheResult<()> {
        let revision = match self.vcs.current_revision(key, mirror).await {
            Ok(revision) => revision,
            Err(e) => {
                warn!("Unable to read revision of {}: {}", mirror.display(), e);
                String::new()
            }
        };

        if !revision.is_empty() && revision == commitish {
            debug!("Mirror already at {}, skipping fetch", commitish);
            return Ok(());
        }

        self.vcs.fetch_all(key, snapshot).await?;
        self.vcs.checkout(key, snapshot, commitish).await
    }

    /// Strip version control metadata from the snapshot
    async fn sanitize(&self, snapshot: &Path) -> RepoCacheResult<()> {
        match fs::remove_dir_all(snapshot.join(GIT_DIR)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RepoCacheError::cache("sanitize", snapshot, e)),
        }
    }
}
