use std::path::PathBuf;

use thiserror::Error;
use transfer::TransferError;

use crate::config::ConfigError;

/// Errors surfaced by file handles and their controller.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: u64, max: u64 },

    #[error("transfer failed: {0}")]
    TransferFailed(#[from] TransferError),

    /// The operation was cancelled before it reached a side effect.
    #[error("operation cancelled")]
    Cancelled,

    #[error("local io failure during {op} on {path}: {source}")]
    LocalIo {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file has not been saved to remote storage")]
    NotSaved,

    #[error("file is dirty but has no payload to upload")]
    MissingPayload,

    #[error("url does not belong to the configured bucket: {0}")]
    ForeignUrl(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The queued unit was torn down without producing a result.
    #[error("operation dropped before completion")]
    Aborted,
}

impl FileError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalIo {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, FileError>;
