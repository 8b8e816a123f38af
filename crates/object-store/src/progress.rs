//! Progress reporting for uploads and downloads.

use std::sync::Arc;

/// A single progress event emitted before a transfer reaches its terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes transferred so far
    pub bytes_current: u64,
    /// Total bytes to transfer
    pub bytes_total: u64,
}

impl TransferProgress {
    pub fn new(bytes_current: u64, bytes_total: u64) -> Self {
        Self {
            bytes_current,
            bytes_total,
        }
    }

    /// Progress as a whole percentage (0 to 100).
    ///
    /// An empty transfer counts as done.
    pub fn percent(&self) -> u8 {
        if self.bytes_total == 0 {
            return 100;
        }
        let ratio = self.bytes_current.min(self.bytes_total) as f64 / self.bytes_total as f64;
        (ratio * 100.0) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_current >= self.bytes_total
    }
}

/// Shared progress listener.
///
/// Transfers may invoke it from any thread, any number of times.
pub type ProgressFn = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Emit a progress event if a listener is attached.
pub fn report(progress: Option<&ProgressFn>, bytes_current: u64, bytes_total: u64) {
    if let Some(progress) = progress {
        progress(TransferProgress::new(bytes_current, bytes_total));
    }
}
