//! Where deploy keys come from on a cache miss

use crate::error::{RepoCacheError, RepoCacheResult};
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// Timeout for a whole key download
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// A store that can produce the bytes of a deploy key by identifier
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Download the key. A key the store does not have is
    /// [`RepoCacheError::CredentialNotFound`].
    async fn download(&self, key: &str) -> RepoCacheResult<Vec<u8>>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// Map a non-success HTTP status from the key store to an error
///
/// Client errors mean the store refused or does not know the key; anything
/// else is an upstream failure worth retrying.
pub fn classify_status(key: &str, status: u16) -> RepoCacheError {
    if (400..500).contains(&status) {
        RepoCacheError::CredentialNotFound {
            key: key.to_string(),
            status,
        }
    } else {
        RepoCacheError::CredentialFetch {
            key: key.to_string(),
            reason: format!("credential store returned status {}", status),
        }
    }
}

/// Keys served over HTTP at `<base_url>/<key>`
pub struct HttpKeySource {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpKeySource {
    /// Create a source for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(DOWNLOAD_TIMEOUT))
            .build();
        Self {
            base_url: base_url.into(),
            agent: ureq::Agent::new_with_config(config),
        }
    }

    /// Full URL of a key
    pub fn url_for(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn download(&self, key: &str) -> RepoCacheResult<Vec<u8>> {
        let url = self.url_for(key);
        let agent = self.agent.clone();
        let name = key.to_string();
        debug!("GET {}", url);

        tokio::task::spawn_blocking(move || {
            let mut response = agent.get(&url).call().map_err(|e| match e {
                ureq::Error::StatusCode(status) => classify_status(&name, status),
                other => RepoCacheError::CredentialFetch {
                    key: name.clone(),
                    reason: other.to_string(),
                },
            })?;
            response
                .body_mut()
                .read_to_vec()
                .map_err(|e| RepoCacheError::CredentialFetch {
                    key: name.clone(),
                    reason: e.to_string(),
                })
        })
        .await
        .map_err(|e| RepoCacheError::Internal(format!("key download task failed: {}", e)))?
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

/// Keys read from files under a local directory
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl KeySource for DirectorySource {
    async fn download(&self, key: &str) -> RepoCacheResult<Vec<u8>> {
        let path = self.root.join(key.trim_start_matches('/'));
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(RepoCacheError::CredentialNotFound {
                    key: key.to_string(),
                    status: 404,
                })
            }
            Err(e) => Err(RepoCacheError::io(
                format!("reading deploy key {}", path.display()),
                e,
            )),
        }
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}
