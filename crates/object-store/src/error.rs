use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by a remote transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("object store error: {0}")]
    Store(#[from] object_store::Error),

    #[error("invalid object key: {0}")]
    InvalidKey(#[from] object_store::path::Error),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid storage config: {0}")]
    Config(String),

    #[error("transfer failed: {0}")]
    Failed(String),
}

impl TransferError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the remote store reported that the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(object_store::Error::NotFound { .. }))
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
