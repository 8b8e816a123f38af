use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::progress::ProgressFn;

/// The remote side of a file: moves whole objects between a local path and
/// the remote store.
///
/// Implementations report zero or more progress events and then exactly one
/// terminal outcome through the returned future. Retries, timeouts and access
/// control are the implementation's business.
#[async_trait]
pub trait RemoteTransfer: Send + Sync + 'static {
    /// Upload `source` under `key`.
    ///
    /// Returns the object id the store now holds the object under. Stores that
    /// keep caller-chosen keys return `key` unchanged.
    async fn upload(&self, key: &str, source: &Path, progress: Option<ProgressFn>)
        -> Result<String>;

    /// Download the object stored under `key` into `dest`.
    ///
    /// On failure `dest` may hold a partial file; cleaning it up is the
    /// caller's job.
    async fn download(&self, key: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<()>;
}
