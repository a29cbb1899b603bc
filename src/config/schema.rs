//! Configuration schema for repocache
//!
//! Configuration is stored at `~/.config/repocache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache pools and purge settings
    pub cache: CacheConfig,

    /// Deploy key source settings
    pub deploy_keys: DeployKeyConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Pool holding one mirror per repository
    pub repositories: PathBuf,

    /// Pool holding one snapshot per repository commit-ish
    pub commitishes: PathBuf,

    /// Pool holding fetched deploy keys
    pub deploy_keys: PathBuf,

    /// Unlocked entries idle for at least this many minutes are purged
    pub purge_age_mins: u64,

    /// Period of the purge scheduler in milliseconds
    pub purge_interval_ms: u64,

    /// How often a contended lock-table path is re-checked, in milliseconds
    pub lock_poll_interval_ms: u64,
}

impl CacheConfig {
    /// Purge age threshold as a duration
    pub fn purge_age(&self) -> Duration {
        Duration::from_secs(self.purge_age_mins * 60)
    }

    /// Purge scheduler period as a duration
    pub fn purge_interval(&self) -> Duration {
        Duration::from_millis(self.purge_interval_ms)
    }

    /// Lock-table poll interval as a duration
    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_interval_ms)
    }

    fn default_root() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("repocache")
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        let root = Self::default_root();
        Self {
            repositories: root.join("repositories"),
            commitishes: root.join("commitishes"),
            deploy_keys: root.join("deploy_keys"),
            purge_age_mins: 30,
            purge_interval_ms: 300_000,
            lock_poll_interval_ms: 100,
        }
    }
}

/// Where deploy keys are downloaded from on a cache miss
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployKeyConfig {
    /// Base URL; keys are fetched from `<url>/<key>`
    pub url: Option<String>,

    /// Local directory; keys are read from `<directory>/<key>`
    pub directory: Option<PathBuf>,
}
