//! Configuration management for repocache

pub mod schema;

pub use schema::Config;

use crate::error::{RepoCacheError, RepoCacheResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use toml_edit::DocumentMut;
use tracing::{debug, info};

/// Kind of value a config key holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyType {
    Text,
    Integer,
    LogFormat,
}

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("repocache")
            .join("config.toml")
    }

    /// Load configuration, falling back to defaults if the file is missing
    pub async fn load(&self) -> RepoCacheResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> RepoCacheResult<Config> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            RepoCacheError::io(format!("reading config from {}", path.display()), e)
        })?;

        toml::from_str(&content).map_err(|e| RepoCacheError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> RepoCacheResult<()> {
        let content = toml::to_string_pretty(config)?;
        self.write(&content).await?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Set a single dot-separated key, keeping the rest of the file intact
    ///
    /// The edited document is parsed back into [`Config`] before it is
    /// written, so a value of the wrong type never reaches disk.
    pub async fn set(&self, key: &str, value: &str) -> RepoCacheResult<Config> {
        let key_type = Self::key_type(key)?;

        let mut doc: DocumentMut = if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path).await.map_err(|e| {
                RepoCacheError::io(format!("reading {}", self.config_path.display()), e)
            })?;
            content.parse().map_err(|e: toml_edit::TomlError| {
                RepoCacheError::ConfigInvalid {
                    path: self.config_path.clone(),
                    reason: e.to_string(),
                }
            })?
        } else {
            DocumentMut::new()
        };

        Self::set_document_value(&mut doc, key, key_type, value)?;

        let content = doc.to_string();
        let config: Config =
            toml::from_str(&content).map_err(|e| RepoCacheError::ConfigInvalid {
                path: self.config_path.clone(),
                reason: e.to_string(),
            })?;

        self.write(&content).await?;
        debug!("Set {} = {} in {}", key, value, self.config_path.display());
        Ok(config)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    async fn write(&self, content: &str) -> RepoCacheResult<()> {
        self.ensure_config_dir().await?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            RepoCacheError::io(format!("writing config to {}", self.config_path.display()), e)
        })
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> RepoCacheResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| RepoCacheError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    fn key_type(key: &str) -> RepoCacheResult<KeyType> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["general", "log_format"] => Ok(KeyType::LogFormat),
            ["cache", "repositories" | "commitishes" | "deploy_keys"]
            | ["deploy_keys", "url" | "directory"] => Ok(KeyType::Text),
            ["cache", "purge_age_mins" | "purge_interval_ms" | "lock_poll_interval_ms"] => {
                Ok(KeyType::Integer)
            }
            _ => Err(RepoCacheError::ConfigKey(key.to_string())),
        }
    }

    fn set_document_value(
        doc: &mut DocumentMut,
        key: &str,
        key_type: KeyType,
        value: &str,
    ) -> RepoCacheResult<()> {
        let (section, field) = key
            .split_once('.')
            .ok_or_else(|| RepoCacheError::ConfigKey(key.to_string()))?;

        let item = match key_type {
            KeyType::Text => toml_edit::value(value),
            KeyType::LogFormat => match value {
                "text" | "json" => toml_edit::value(value),
                _ => {
                    return Err(RepoCacheError::User(format!(
                        "Invalid log format '{}': expected text or json",
                        value
                    )))
                }
            },
            KeyType::Integer => {
                let n: i64 = value.parse().map_err(|_| {
                    RepoCacheError::User(format!("Invalid integer for {}: '{}'", key, value))
                })?;
                if n < 0 {
                    return Err(RepoCacheError::User(format!(
                        "{} must not be negative",
                        key
                    )));
                }
                toml_edit::value(n)
            }
        };

        let table = doc
            .entry(section)
            .or_insert(toml_edit::table())
            .as_table_mut()
            .ok_or_else(|| RepoCacheError::ConfigInvalid {
                path: PathBuf::from(section),
                reason: format!("[{}] is not a table", section),
            })?;
        table[field] = item;
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.cache.purge_age_mins, 30);
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.cache.repositories = PathBuf::from("/srv/repos");

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.cache.repositories, PathBuf::from("/srv/repos"));
    }

    #[tokio::test]
    async fn invalid_file_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[cache\n").unwrap();
        let manager = ConfigManager::with_path(path.clone());

        match manager.load().await {
            Err(RepoCacheError::ConfigInvalid { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected ConfigInvalid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn set_preserves_comments() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "# pools live on the big disk\n[cache]\npurge_age_mins = 30\n")
            .unwrap();
        let manager = ConfigManager::with_path(path.clone());

        let config = manager.set("cache.purge_age_mins", "45").await.unwrap();
        assert_eq!(config.cache.purge_age_mins, 45);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("# pools live on the big disk"));
        assert!(content.contains("purge_age_mins = 45"));
    }

    #[tokio::test]
    async fn set_creates_missing_section() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("config.toml"));

        let config = manager
            .set("deploy_keys.url", "https://keys.example.com")
            .await
            .unwrap();
        assert_eq!(config.deploy_keys.url.as_deref(), Some("https://keys.example.com"));
    }

    #[tokio::test]
    async fn set_rejects_unknown_key_and_bad_values() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("config.toml"));

        assert!(matches!(
            manager.set("cache.nope", "1").await,
            Err(RepoCacheError::ConfigKey(_))
        ));
        assert!(manager.set("cache.purge_interval_ms", "soon").await.is_err());
        assert!(manager.set("general.log_format", "xml").await.is_err());
        assert!(!manager.path().exists());
    }
}
