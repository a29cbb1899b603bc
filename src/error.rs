//! Error types for repocache
//!
//! All modules use `RepoCacheResult<T>` as their return type. Every error
//! carries an [`ErrorKind`] so a surrounding service can map it to a
//! response status without inspecting variants.

use crate::git::GitOperation;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for repocache operations
pub type RepoCacheResult<T> = Result<T, RepoCacheError>;

/// Coarse classification of an error, preserved for callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, nothing was touched
    Validation,
    /// A required resource (credential) does not exist
    NotFound,
    /// A remote (git remote, credential source) failed
    Upstream,
    /// Local filesystem or command failure
    Internal,
}

impl ErrorKind {
    /// HTTP-style status code for this kind
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::NotFound => 404,
            Self::Upstream => 502,
            Self::Internal => 500,
        }
    }
}

/// All errors that can occur in repocache
#[derive(Error, Debug)]
pub enum RepoCacheError {
    // Startup errors
    #[error("Unable to initialize cache {path}: {source}")]
    CacheInit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache directory is not writable: {0}")]
    CacheNotWritable(PathBuf),

    // Validation errors
    #[error("Invalid repository address: {0}")]
    InvalidRepository(String),

    #[error("Parameter `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    // Credential errors
    #[error("Missing deploy key: {0}")]
    MissingCredential(PathBuf),

    #[error("Deploy key not found in credential store: {key} (status {status})")]
    CredentialNotFound { key: String, status: u16 },

    #[error("Failed to fetch deploy key {key}: {reason}")]
    CredentialFetch { key: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown config key: {0}")]
    ConfigKey(String),

    // Cache entry errors
    #[error("Cache {operation} failed for {path}: {source}")]
    Cache {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Git errors
    #[error("git {operation} failed in {path}: {stderr}")]
    Git {
        operation: GitOperation,
        path: PathBuf,
        stderr: String,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl RepoCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a cache entry error for the given operation and path
    pub fn cache(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Cache {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Whether a cache operation failed because its entry no longer exists
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Cache { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a validation error for a request field
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Classify the error for callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRepository(_)
            | Self::InvalidField { .. }
            | Self::ConfigKey(_)
            | Self::User(_) => ErrorKind::Validation,
            Self::MissingCredential(_) | Self::CredentialNotFound { .. } => ErrorKind::NotFound,
            Self::CredentialFetch { .. } => ErrorKind::Upstream,
            Self::Git { operation, .. } if operation.is_remote() => ErrorKind::Upstream,
            _ => ErrorKind::Internal,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Upstream
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CacheInit { .. } | Self::CacheNotWritable(_) => {
                Some("Check the [cache] paths in your config: repocache config show")
            }
            Self::InvalidRepository(_) => {
                Some("Use an address like git@github.com:org/repo or https://github.com/org/repo")
            }
            Self::MissingCredential(_) => Some("Pass --key to fetch the deploy key first"),
            Self::CredentialNotFound { .. } | Self::CredentialFetch { .. } => {
                Some("Check [deploy_keys] url/directory in your config")
            }
            Self::CommandFailed { .. } => Some("Is git installed and on PATH?"),
            _ => None,
        }
    }
}
