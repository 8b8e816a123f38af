//! File controller configuration.
//!
//! ```toml
//! cache_dir = "/var/cache/jax/files"
//! base_url = "https://s3.amazonaws.com"
//! bucket = "jax-files"
//!
//! [storage]
//! type = "s3"
//! endpoint = "https://s3.amazonaws.com"
//! access_key = "..."
//! secret_key = "..."
//! bucket = "jax-files"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use transfer::ObjectStoreConfig;

use crate::location::RemoteLocation;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required config: {0}")]
    Missing(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    /// Directory holding cached copies of remote files
    pub cache_dir: PathBuf,
    /// Public base url of the object store, used to build file urls
    pub base_url: String,
    /// Bucket name, the second component of every file url
    pub bucket: String,
    /// Backend the transfer client talks to
    #[serde(default)]
    pub storage: ObjectStoreConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        if config.bucket.is_empty() {
            return Err(ConfigError::Missing("bucket".to_string()));
        }
        if config.base_url.is_empty() {
            return Err(ConfigError::Missing("base_url".to_string()));
        }
        Ok(config)
    }

    pub fn location(&self) -> RemoteLocation {
        RemoteLocation::new(&self.base_url, &self.bucket)
    }
}
