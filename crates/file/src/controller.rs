//! Shared backend for file handles: the cache directory, the remote transfer
//! client and the main-thread dispatcher.
//!
//! The controller holds no per-file state. Ordering between operations on one
//! file is the handle's job; the controller only implements a single upload or
//! fetch against the cache and the remote store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use transfer::{ObjectStoreTransfer, ProgressFn, RemoteTransfer};
use uuid::Uuid;

use crate::cache::CacheStore;
use crate::config::{ConfigError, FileConfig};
use crate::dispatch::{ImmediateDispatcher, MainDispatcher};
use crate::error::{FileError, Result};
use crate::location::RemoteLocation;
use crate::state::FileState;

/// Prefix every uploaded object key is placed under.
const KEY_PREFIX: &str = "file";

/// Local content of a dirty file, waiting to be uploaded.
#[derive(Debug, Clone)]
pub(crate) enum Payload {
    Bytes(Bytes),
    File(PathBuf),
}

pub struct FileController {
    cache: CacheStore,
    transfer: Arc<dyn RemoteTransfer>,
    location: RemoteLocation,
    dispatcher: Arc<dyn MainDispatcher>,
    runtime: Handle,
}

impl FileController {
    pub fn builder() -> FileControllerBuilder {
        FileControllerBuilder::default()
    }

    /// Build a controller backed by the object store described in `config`.
    ///
    /// Must be called from within a tokio runtime; units run on that runtime
    /// and callbacks are delivered inline.
    pub fn from_config(config: &FileConfig) -> Result<Self> {
        let transfer = ObjectStoreTransfer::new(config.storage.clone())
            .map_err(|e| ConfigError::Invalid(format!("storage: {}", e)))?;

        let controller = Self::builder()
            .cache_dir(&config.cache_dir)
            .location(config.location())
            .transfer(Arc::new(transfer))
            .build()?;
        Ok(controller)
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn location(&self) -> &RemoteLocation {
        &self.location
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn dispatcher(&self) -> &Arc<dyn MainDispatcher> {
        &self.dispatcher
    }

    /// Where the cached copy of `state` lives, whether or not it exists yet.
    pub fn cache_path(&self, state: &FileState) -> PathBuf {
        self.cache.path_for(state.name())
    }

    /// Download staging path for `state`. `None` until the file has a url.
    pub fn temp_path(&self, state: &FileState) -> Option<PathBuf> {
        let object_id = self.location.object_id(state.url()?)?;
        Some(self.cache.temp_path_for(object_id))
    }

    pub fn is_cached(&self, state: &FileState) -> bool {
        self.cache.exists(&self.cache_path(state))
    }

    /// Remove every cached file. Returns how many entries were removed.
    pub async fn clear_cache(&self) -> Result<usize> {
        self.cache.clear().await
    }

    /// Upload `payload` and return the clean state that replaces `state`.
    ///
    /// A clean `state` is returned as is. In-memory payloads are written to the
    /// cache first and uploaded from there, so a saved file is already cached.
    pub(crate) async fn save(
        &self,
        state: &FileState,
        payload: &Payload,
        cancel: &CancellationToken,
        progress: Option<ProgressFn>,
    ) -> Result<FileState> {
        if !state.is_dirty() {
            return Ok(state.clone());
        }
        if cancel.is_cancelled() {
            return Err(FileError::Cancelled);
        }

        let source = match payload {
            Payload::Bytes(data) => {
                let path = self.cache_path(state);
                self.cache.write(&path, data.clone()).await?;
                path
            }
            Payload::File(path) => path.clone(),
        };
        if cancel.is_cancelled() {
            return Err(FileError::Cancelled);
        }

        let key = format!("{}/{}-{}", KEY_PREFIX, Uuid::new_v4(), state.name());
        debug!(name = state.name(), key = %key, source = %source.display(), "uploading file");

        let object_id = self.transfer.upload(&key, &source, progress).await?;
        let url = self.location.url_for(&object_id);

        info!(name = state.name(), url = %url, "file saved");
        Ok(state.with_url(url))
    }

    /// Make sure the file is in the cache and return its path.
    ///
    /// A cached file is returned without contacting the remote store.
    /// Downloads land in a temp file that only replaces the cache file once
    /// complete; it is removed on every failure path.
    pub(crate) async fn fetch(
        &self,
        state: &FileState,
        cancel: &CancellationToken,
        progress: Option<ProgressFn>,
    ) -> Result<PathBuf> {
        if cancel.is_cancelled() {
            return Err(FileError::Cancelled);
        }

        let cache_path = self.cache_path(state);
        if self.cache.contains(&cache_path).await {
            debug!(path = %cache_path.display(), "cache hit");
            return Ok(cache_path);
        }
        if cancel.is_cancelled() {
            return Err(FileError::Cancelled);
        }

        let url = state.url().ok_or(FileError::NotSaved)?;
        let object_id = self
            .location
            .object_id(url)
            .ok_or_else(|| FileError::ForeignUrl(url.to_string()))?;
        let temp_path = self.cache.temp_path_for(object_id);

        debug!(object_id, temp = %temp_path.display(), "downloading file");
        if let Err(e) = self.transfer.download(object_id, &temp_path, progress).await {
            self.cache.remove(&temp_path).await;
            return Err(e.into());
        }

        self.replace_cached(&temp_path, &cache_path).await?;
        info!(object_id, path = %cache_path.display(), "file fetched");
        Ok(cache_path)
    }

    async fn replace_cached(&self, temp_path: &Path, cache_path: &Path) -> Result<()> {
        self.cache.remove(cache_path).await;
        if let Err(e) = self.cache.rename(temp_path, cache_path).await {
            warn!(temp = %temp_path.display(), error = %e, "failed to move download into cache");
            self.cache.remove(temp_path).await;
            return Err(e);
        }
        Ok(())
    }
}

impl std::fmt::Debug for FileController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileController")
            .field("cache", &self.cache)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct FileControllerBuilder {
    cache_dir: Option<PathBuf>,
    location: Option<RemoteLocation>,
    transfer: Option<Arc<dyn RemoteTransfer>>,
    dispatcher: Option<Arc<dyn MainDispatcher>>,
    runtime: Option<Handle>,
}

impl FileControllerBuilder {
    pub fn cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    pub fn location(mut self, location: RemoteLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn transfer(mut self, transfer: Arc<dyn RemoteTransfer>) -> Self {
        self.transfer = Some(transfer);
        self
    }

    /// Where callbacks and progress events are delivered. Defaults to
    /// [`ImmediateDispatcher`].
    pub fn dispatcher(mut self, dispatcher: Arc<dyn MainDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Runtime queued units are spawned on. Defaults to the current runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> std::result::Result<FileController, ConfigError> {
        let cache_dir = self
            .cache_dir
            .ok_or_else(|| ConfigError::Missing("cache_dir".to_string()))?;
        let location = self
            .location
            .ok_or_else(|| ConfigError::Missing("location".to_string()))?;
        let transfer = self
            .transfer
            .ok_or_else(|| ConfigError::Missing("transfer".to_string()))?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()
                .map_err(|_| ConfigError::Invalid("no tokio runtime to run on".to_string()))?,
        };

        Ok(FileController {
            cache: CacheStore::new(cache_dir),
            transfer,
            location,
            dispatcher: self
                .dispatcher
                .unwrap_or_else(|| Arc::new(ImmediateDispatcher)),
            runtime,
        })
    }
}
