//! Unlock command - release a snapshot so it can age out

use crate::cache::CacheStore;
use crate::cli::args::UnlockArgs;
use crate::config::Config;
use crate::error::{RepoCacheError, RepoCacheResult};
use crate::git::Git;
use crate::repository::Repository;
use crate::ui::{self, UiContext};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;

/// Execute the unlock command
pub async fn execute(args: UnlockArgs, config: &Config) -> RepoCacheResult<()> {
    let ctx = UiContext::detect();

    if !args.path.is_dir() {
        return Err(RepoCacheError::User(format!(
            "No cache entry at {}",
            args.path.display()
        )));
    }
    if !is_snapshot_entry(&args.path, &config.cache.commitishes).await {
        return Err(RepoCacheError::User(format!(
            "{} is not a snapshot in {}",
            args.path.display(),
            config.cache.commitishes.display()
        )));
    }

    let cache = Arc::new(CacheStore::from_config(&config.cache));
    let repository = Repository::from_config(&config.cache, cache, Arc::new(Git::new()));
    repository.release(&args.path).await?;

    ui::step_ok(&ctx, &format!("Released {}", args.path.display()));
    Ok(())
}

/// Whether `path` is a direct child of the snapshot pool
async fn is_snapshot_entry(path: &Path, pool: &Path) -> bool {
    let (Ok(path), Ok(pool)) = (fs::canonicalize(path).await, fs::canonicalize(pool).await)
    else {
        return false;
    };
    path.parent() == Some(pool.as_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn only_pool_children_are_snapshots() {
        let temp = TempDir::new().unwrap();
        let pool = temp.path().join("commitishes");
        let snapshot = pool.join("github.com+acme+widgets@abc123");
        std::fs::create_dir_all(snapshot.join("src")).unwrap();

        assert!(is_snapshot_entry(&snapshot, &pool).await);
        assert!(is_snapshot_entry(&pool.join("./github.com+acme+widgets@abc123"), &pool).await);
        assert!(!is_snapshot_entry(&snapshot.join("src"), &pool).await);
        assert!(!is_snapshot_entry(&pool, &pool).await);
        assert!(!is_snapshot_entry(temp.path(), &pool).await);
    }
}
