//! ObjectStoreTransfer - RemoteTransfer backed by any `object_store` backend.
//!
//! Uploads read the local file whole and `put` it in one request; downloads
//! stream the object into the destination chunk by chunk, reporting progress
//! per chunk.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Result, TransferError};
use crate::progress::{report, ProgressFn};
use crate::storage::ObjectStoreConfig;
use crate::transfer::RemoteTransfer;

#[derive(Debug, Clone)]
pub struct ObjectStoreTransfer {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreTransfer {
    /// Create a transfer client for the configured backend.
    pub fn new(config: ObjectStoreConfig) -> Result<Self> {
        Ok(Self::from_store(config.build()?))
    }

    /// Wrap an already built store.
    pub fn from_store(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Create a transfer client over a fresh in-memory store.
    /// Useful for testing.
    pub fn memory() -> Self {
        Self::from_store(Arc::new(InMemory::new()))
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }
}

#[async_trait]
impl RemoteTransfer for ObjectStoreTransfer {
    async fn upload(
        &self,
        key: &str,
        source: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<String> {
        let location = ObjectPath::parse(key)?;
        let data = tokio::fs::read(source)
            .await
            .map_err(|e| TransferError::io(source, e))?;
        let total = data.len() as u64;

        debug!(key = %location, size = total, "uploading object");
        report(progress.as_ref(), 0, total);

        self.store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await?;

        report(progress.as_ref(), total, total);
        info!(key = %location, size = total, "object uploaded");
        Ok(location.to_string())
    }

    async fn download(&self, key: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<()> {
        let location = ObjectPath::parse(key)?;
        let result = self.store.get(&location).await?;
        let total = result.meta.size as u64;

        debug!(key = %location, size = total, dest = %dest.display(), "downloading object");

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::io(parent, e))?;
        }
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| TransferError::io(dest, e))?;

        report(progress.as_ref(), 0, total);
        let mut current = 0u64;
        let mut stream = result.into_stream();
        while let Some(chunk) = stream.try_next().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| TransferError::io(dest, e))?;
            current += chunk.len() as u64;
            report(progress.as_ref(), current, total);
        }

        file.flush().await.map_err(|e| TransferError::io(dest, e))?;
        file.sync_all()
            .await
            .map_err(|e| TransferError::io(dest, e))?;

        info!(key = %location, size = current, "object downloaded");
        Ok(())
    }
}
