//! Error handling module for oct
//!
//! Provides the typed error used across the library. The binary wraps these
//! in `anyhow` at the command boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for oct
#[derive(Error, Debug)]
pub enum OctError {
    /// IO errors (directory creation, file reads and writes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An existing configuration file could not be read back
    #[error("Failed to load configuration from {path:?}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A configuration object could not be rendered as YAML
    #[error("Failed to serialize configuration for {path:?}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// JSON serialization errors (extra variables handed to Ansible)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors (root resolution, missing directories)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors (user input, option values, playbook identifiers)
    #[error("Validation error: {0}")]
    Validation(String),

    /// No free hostname was found under the Vagrant root
    #[error("No available hostname derived from '{base}' under {root:?}")]
    HostnameExhausted { base: String, root: PathBuf },

    /// The playbook binary could not be started
    #[error("Failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// ansible-playbook exited unsuccessfully
    #[error("Playbook {playbook:?} failed with exit code {code}")]
    PlaybookFailed { playbook: PathBuf, code: i32 },
}

/// Result type alias for oct operations
pub type Result<T> = std::result::Result<T, OctError>;

impl OctError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
