//! Remote transfer client for jax files
//!
//! This crate defines the boundary between a file handle and the remote object
//! store that holds its authoritative copy: a [`RemoteTransfer`] trait with
//! upload/download primitives that report progress before a terminal outcome.
//!
//! # Features
//!
//! - Pluggable collaborator trait, so hosts can bring their own transfer stack
//! - [`ObjectStoreTransfer`]: an implementation over the `object_store` crate
//! - Multiple storage backends: S3, MinIO, local filesystem, in-memory
//!
//! # Example
//!
//! ```rust,no_run
//! use jax_transfer::{ObjectStoreConfig, ObjectStoreTransfer, RemoteTransfer};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), jax_transfer::TransferError> {
//! // S3/MinIO from a connection url
//! let config = ObjectStoreConfig::parse_s3_url("s3://minioadmin:minioadmin@localhost:9000/files")?;
//! let transfer = ObjectStoreTransfer::new(config)?;
//!
//! let object_id = transfer
//!     .upload("file/report.pdf", Path::new("/tmp/report.pdf"), None)
//!     .await?;
//! transfer
//!     .download(&object_id, Path::new("/tmp/report-copy.pdf"), None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod progress;
mod storage;
mod store;
mod transfer;

pub use error::{Result, TransferError};
pub use progress::{report, ProgressFn, TransferProgress};
pub use storage::ObjectStoreConfig;
pub use store::ObjectStoreTransfer;
pub use transfer::RemoteTransfer;
