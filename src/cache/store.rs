//! Filesystem cache pools with sentinel locking and LRU purging
//!
//! A pool is a root directory; every direct child directory of a pool is a
//! cache entry. Recency is the entry's access time, refreshed by
//! [`CacheStore::touch`]. An entry holding a [`LOCK_DIR`] subdirectory is
//! never purged.

use crate::cache::usage::{CacheUsage, PoolUsage};
use crate::config::schema::CacheConfig;
use crate::error::{RepoCacheError, RepoCacheResult};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use futures_util::future::join_all;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Name of the sentinel subdirectory that excludes an entry from purging
pub const LOCK_DIR: &str = ".lock";

/// Pool names used by [`CacheStore::from_config`]
pub mod pools {
    /// Repository mirrors, one per repository
    pub const REPOSITORIES: &str = "repositories";
    /// Commit-ish snapshots, one per repository commit-ish
    pub const COMMITISHES: &str = "commitishes";
    /// Deploy keys
    pub const DEPLOY_KEYS: &str = "deploy_keys";
}

/// A named root directory holding cache entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachePool {
    /// Pool name
    pub name: String,
    /// Root directory
    pub root: PathBuf,
}

impl CachePool {
    /// Create a pool record
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }
}

/// A direct child directory of a pool
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    /// Owning pool name
    pub pool: String,
    /// Absolute entry path
    pub path: PathBuf,
    /// Last access time used for LRU ordering
    pub last_accessed: DateTime<Utc>,
    /// Whether the lock sentinel is present
    pub locked: bool,
}

impl CacheEntry {
    /// Time since the entry was last accessed
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_accessed).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether purge would delete this entry given the age threshold
    pub fn is_purgeable(&self, now: DateTime<Utc>, purge_age: Duration) -> bool {
        !self.locked && self.idle_for(now) >= purge_age
    }
}

/// Result of purging a single pool
#[derive(Debug)]
pub struct PoolPurge {
    /// Pool name
    pub pool: String,
    /// Entries that were deleted
    pub removed: Vec<PathBuf>,
    /// Failures; one failing entry does not stop the rest of the pool
    pub errors: Vec<RepoCacheError>,
}

impl PoolPurge {
    /// True when every eligible entry was removed
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Owns the cache pools and the primitives that mutate cache entries
#[derive(Debug, Clone)]
pub struct CacheStore {
    pools: Vec<CachePool>,
    purge_age: Duration,
}

impl CacheStore {
    /// Create a store over the given pools
    pub fn new(pools: Vec<CachePool>, purge_age: Duration) -> Self {
        Self { pools, purge_age }
    }

    /// Create the standard three-pool store from configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            vec![
                CachePool::new(pools::DEPLOY_KEYS, &config.deploy_keys),
                CachePool::new(pools::REPOSITORIES, &config.repositories),
                CachePool::new(pools::COMMITISHES, &config.commitishes),
            ],
            config.purge_age(),
        )
    }

    /// Configured pools
    pub fn pools(&self) -> &[CachePool] {
        &self.pools
    }

    /// Idle time after which an unlocked entry is purged
    pub fn purge_age(&self) -> Duration {
        self.purge_age
    }

    /// Create every pool root, failing if any cannot be created or written
    pub async fn initialize(&self) -> RepoCacheResult<()> {
        info!("Initializing file system caches");

        let results = join_all(self.pools.iter().map(Self::init_pool)).await;

        let mut first_error = None;
        for (pool, result) in self.pools.iter().zip(results) {
            match result {
                Ok(()) => debug!("Cache initialized: {}", pool.root.display()),
                Err(e) => {
                    error!("Unable to initialize cache {}: {}", pool.root.display(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn init_pool(pool: &CachePool) -> RepoCacheResult<()> {
        fs::create_dir_all(&pool.root)
            .await
            .map_err(|e| RepoCacheError::CacheInit {
                path: pool.root.clone(),
                source: e,
            })?;

        let meta = fs::metadata(&pool.root)
            .await
            .map_err(|e| RepoCacheError::CacheInit {
                path: pool.root.clone(),
                source: e,
            })?;
        if meta.permissions().readonly() {
            return Err(RepoCacheError::CacheNotWritable(pool.root.clone()));
        }
        Ok(())
    }

    /// Refresh an entry's recency without changing its content
    pub async fn touch(&self, path: &Path) -> RepoCacheResult<()> {
        debug!("touch {}", path.display());
        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let now = FileTime::now();
            filetime::set_file_times(&target, now, now)
        })
        .await
        .map_err(|e| RepoCacheError::Internal(format!("touch task failed: {}", e)))?
        .map_err(|e| RepoCacheError::cache("touch", path, e))
    }

    /// Exclude an entry from purging. Safe to call on an already locked entry.
    ///
    /// The entry itself must exist; locking never creates it, so a lock that
    /// races a purge fails instead of leaving an empty entry behind.
    pub async fn lock(&self, path: &Path) -> RepoCacheResult<()> {
        debug!("LOCK {}", path.display());
        match fs::create_dir(path.join(LOCK_DIR)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(RepoCacheError::cache("lock", path, e)),
        }
    }

    /// Move a finished entry to its final name within the same pool
    pub async fn rename(&self, from: &Path, to: &Path) -> RepoCacheResult<()> {
        debug!("rename {} -> {}", from.display(), to.display());
        fs::rename(from, to)
            .await
            .map_err(|e| RepoCacheError::cache("rename", to, e))
    }

    /// Make an entry purgeable again. A missing sentinel is not an error.
    pub async fn unlock(&self, path: &Path) -> RepoCacheResult<()> {
        debug!("UNLOCK {}", path.display());
        match fs::remove_dir(path.join(LOCK_DIR)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RepoCacheError::cache("unlock", path, e)),
        }
    }

    /// Whether the entry currently carries the lock sentinel
    pub fn is_locked(path: &Path) -> bool {
        path.join(LOCK_DIR).is_dir()
    }

    /// Delete an entry recursively. A missing entry is not an error.
    pub async fn remove(&self, path: &Path) -> RepoCacheResult<()> {
        match fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RepoCacheError::cache("remove", path, e)),
        }
    }

    /// Recursively copy `source` into `dest`, merging with whatever `dest`
    /// already holds. Symlinks are recreated, not followed.
    pub async fn copy(&self, source: &Path, dest: &Path) -> RepoCacheResult<()> {
        debug!("copy {} -> {}", source.display(), dest.display());
        let (src, dst) = (source.to_path_buf(), dest.to_path_buf());
        tokio::task::spawn_blocking(move || copy_tree(&src, &dst))
            .await
            .map_err(|e| RepoCacheError::Internal(format!("copy task failed: {}", e)))?
            .map_err(|e| RepoCacheError::cache("copy", dest, e))
    }

    /// Recursive disk usage per pool and in total
    ///
    /// Walks every file under every pool, so it is slow on large caches.
    pub async fn usage(&self) -> RepoCacheResult<CacheUsage> {
        info!("Calculating cache disk usage");
        let pools = self.pools.clone();

        let usage = tokio::task::spawn_blocking(move || {
            pools
                .into_iter()
                .map(|pool| {
                    let bytes = dir_size(&pool.root).map_err(|e| {
                        RepoCacheError::io(format!("measuring {}", pool.root.display()), e)
                    })?;
                    Ok(PoolUsage {
                        name: pool.name,
                        path: pool.root,
                        bytes,
                    })
                })
                .collect::<RepoCacheResult<Vec<_>>>()
        })
        .await
        .map_err(|e| RepoCacheError::Internal(format!("usage task failed: {}", e)))?;

        match usage {
            Ok(pools) => Ok(CacheUsage::new(pools)),
            Err(e) => {
                error!("Unable to collect disk usage information: {}", e);
                Err(e)
            }
        }
    }

    /// All entries across every pool
    pub async fn entries(&self) -> RepoCacheResult<Vec<CacheEntry>> {
        let mut all = Vec::new();
        for pool in &self.pools {
            all.extend(Self::pool_entries(pool).await?);
        }
        Ok(all)
    }

    /// Entries that a purge would delete right now
    pub async fn purge_candidates(&self) -> RepoCacheResult<Vec<CacheEntry>> {
        let now = Utc::now();
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter(|entry| entry.is_purgeable(now, self.purge_age))
            .collect())
    }

    /// Delete every unlocked entry idle for at least the purge age
    ///
    /// Each pool is purged independently; a failure in one pool is reported
    /// in its [`PoolPurge`] and never stops the others.
    pub async fn purge(&self) -> Vec<PoolPurge> {
        info!("Purging caches");
        let outcomes = join_all(self.pools.iter().map(|pool| self.purge_pool(pool))).await;

        for outcome in &outcomes {
            if outcome.is_ok() {
                debug!(
                    "Cache purged: {} ({} removed)",
                    outcome.pool,
                    outcome.removed.len()
                );
            } else {
                for e in &outcome.errors {
                    error!("Purge failed for {}: {}", outcome.pool, e);
                }
            }
        }
        outcomes
    }

    async fn purge_pool(&self, pool: &CachePool) -> PoolPurge {
        let mut outcome = PoolPurge {
            pool: pool.name.clone(),
            removed: Vec::new(),
            errors: Vec::new(),
        };

        let entries = match Self::pool_entries(pool).await {
            Ok(entries) => entries,
            Err(e) => {
                outcome.errors.push(e);
                return outcome;
            }
        };

        let now = Utc::now();
        for entry in entries {
            if !entry.is_purgeable(now, self.purge_age) {
                continue;
            }
            match self.remove(&entry.path).await {
                Ok(()) => {
                    debug!("Purged {}", entry.path.display());
                    outcome.removed.push(entry.path);
                }
                Err(e) => {
                    warn!("Failed to purge {}: {}", entry.path.display(), e);
                    outcome.errors.push(e);
                }
            }
        }
        outcome
    }

    async fn pool_entries(pool: &CachePool) -> RepoCacheResult<Vec<CacheEntry>> {
        let mut dir = fs::read_dir(&pool.root).await.map_err(|e| {
            RepoCacheError::io(format!("reading cache pool {}", pool.root.display()), e)
        })?;

        let mut entries = Vec::new();
        while let Some(child) = dir.next_entry().await.map_err(|e| {
            RepoCacheError::io(format!("reading cache pool {}", pool.root.display()), e)
        })? {
            let meta = match child.metadata().await {
                Ok(meta) => meta,
                // Removed between listing and stat
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(RepoCacheError::io(
                        format!("reading {}", child.path().display()),
                        e,
                    ))
                }
            };
            if !meta.is_dir() {
                continue;
            }

            let accessed = meta
                .accessed()
                .or_else(|_| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            let path = child.path();
            entries.push(CacheEntry {
                pool: pool.name.clone(),
                locked: Self::is_locked(&path),
                path,
                last_accessed: DateTime::<Utc>::from(accessed),
            });
        }
        Ok(entries)
    }
}

fn copy_tree(source: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> io::Result<()> {
    let link = std::fs::read_link(source)?;
    match std::fs::remove_file(target) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::os::unix::fs::symlink(link, target)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> io::Result<()> {
    std::fs::copy(source, target).map(|_| ())
}

fn dir_size(root: &Path) -> io::Result<u64> {
    // Surface a missing or unreadable pool root, skip entries that vanish mid-walk
    std::fs::metadata(root)?;

    let total = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum();
    Ok(total)
}
