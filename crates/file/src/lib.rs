//! Remote-backed file handles
//!
//! A [`FileHandle`] is one logical file that may exist only locally (bytes in
//! memory or a file on disk), only in a remote object store, or in both. It
//! saves (uploads) and fetches (downloads into a local cache) asynchronously,
//! while keeping at most one operation per handle touching the cache or the
//! remote store at a time.
//!
//! # Features
//!
//! - Per-handle FIFO ordering of saves and fetches, whatever their latency
//! - Cooperative cancellation of everything in flight on a handle
//! - Local cache that never exposes a partially downloaded file
//! - Callbacks and progress delivered on the host's main thread
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jax_file::{FileConfig, FileController, FileHandle};
//!
//! # async fn example() -> Result<(), jax_file::FileError> {
//! let config = FileConfig::load("files.toml".as_ref())?;
//! let controller = Arc::new(FileController::from_config(&config)?);
//!
//! let file = FileHandle::from_named_bytes(&controller, "hello.txt", None, &b"hello"[..])?;
//! file.save_async(None).await?;
//! println!("saved to {}", file.url().unwrap_or_default());
//!
//! let data = file.get_data_async(None).await?;
//! assert_eq!(&data[..], b"hello");
//! # Ok(())
//! # }
//! ```

mod cache;
mod cancel;
mod config;
mod controller;
mod dispatch;
mod error;
mod handle;
mod location;
mod queue;
mod record;
mod state;

pub use cache::CacheStore;
pub use cancel::{CancelGuard, CancellationRegistry};
pub use config::{ConfigError, FileConfig};
pub use controller::{FileController, FileControllerBuilder};
pub use dispatch::{ChannelDispatcher, ImmediateDispatcher, MainDispatcher, MainLoop, MainTask};
pub use error::{FileError, Result};
pub use handle::{FileHandle, MAX_PAYLOAD_SIZE};
pub use location::RemoteLocation;
pub use queue::{Predecessor, QueuedTask, TaskQueue};
pub use record::FileRecord;
pub use state::{FileState, FileStateBuilder, DEFAULT_NAME};

// Transfer types callers need to implement or listen to
pub use transfer::{ProgressFn, RemoteTransfer, TransferError, TransferProgress};
