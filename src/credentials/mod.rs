//! Deploy key cache
//!
//! Keys are stored in the deploy-key pool, one entry per key identifier,
//! with the key itself in an `ssh-key` file. A cached key is touched on
//! reuse so it ages like any other cache entry; a missing one is
//! downloaded from the configured [`KeySource`].

pub mod source;

pub use source::{classify_status, DirectorySource, HttpKeySource, KeySource};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{RepoCacheError, RepoCacheResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// File name of the key inside its cache entry
pub const SSH_KEY_FILE: &str = "ssh-key";

/// Build the key source named in configuration. The URL wins when both are set.
pub fn source_from_config(config: &Config) -> RepoCacheResult<Arc<dyn KeySource>> {
    if let Some(url) = &config.deploy_keys.url {
        return Ok(Arc::new(HttpKeySource::new(url.clone())));
    }
    if let Some(dir) = &config.deploy_keys.directory {
        return Ok(Arc::new(DirectorySource::new(dir.clone())));
    }
    Err(RepoCacheError::User(
        "No deploy key source configured; set deploy_keys.url or deploy_keys.directory"
            .to_string(),
    ))
}

/// Deploy key cache over the deploy-key pool
pub struct DeployKeyStore {
    cache: Arc<CacheStore>,
    root: PathBuf,
    source: Arc<dyn KeySource>,
}

impl DeployKeyStore {
    pub fn new(cache: Arc<CacheStore>, root: impl Into<PathBuf>, source: Arc<dyn KeySource>) -> Self {
        Self {
            cache,
            root: root.into(),
            source,
        }
    }

    /// Cache entry for a key identifier: `/foo/bar/baz` becomes `<pool>/foo.bar.baz`
    pub fn cache_path(&self, key: &str) -> RepoCacheResult<PathBuf> {
        let trimmed = key.strip_prefix('/').unwrap_or(key);
        let segments: Vec<&str> = trimmed.split('/').collect();
        let valid = segments
            .iter()
            .all(|s| !s.is_empty() && *s != "." && *s != "..");
        if !valid {
            return Err(RepoCacheError::invalid_field(
                "key",
                format!("'{}' is not a valid deploy key identifier", key),
            ));
        }
        Ok(self.root.join(segments.join(".")))
    }

    /// Location of the key file for a key identifier
    pub fn ssh_key_path(&self, key: &str) -> RepoCacheResult<PathBuf> {
        Ok(self.cache_path(key)?.join(SSH_KEY_FILE))
    }

    /// Local path of the key, downloading it on a cache miss
    pub async fn fetch(&self, key: &str) -> RepoCacheResult<PathBuf> {
        let entry = self.cache_path(key)?;
        let key_path = entry.join(SSH_KEY_FILE);

        if key_path.is_file() {
            debug!("Deploy key cache hit: {}", key);
            self.cache.touch(&entry).await?;
            return Ok(key_path);
        }

        info!("Fetching deploy key {} from {}", key, self.source.describe());
        fs::create_dir_all(&entry)
            .await
            .map_err(|e| RepoCacheError::cache("create", &entry, e))?;

        let bytes = self.source.download(key).await?;
        Self::write_key(&key_path, &bytes).await?;
        Ok(key_path)
    }

    /// Write the key owner-readable only, replacing the file in one step
    async fn write_key(path: &Path, bytes: &[u8]) -> RepoCacheResult<()> {
        let partial = path.with_extension("partial");
        fs::write(&partial, bytes).await.map_err(|e| {
            RepoCacheError::io(format!("writing deploy key {}", partial.display()), e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&partial, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| RepoCacheError::io("setting deploy key permissions", e))?;
        }

        fs::rename(&partial, path).await.map_err(|e| {
            RepoCacheError::io(format!("storing deploy key {}", path.display()), e)
        })
    }
}
