//! FileHandle - one logical file, local and/or remote.
//!
//! Every save and fetch on a handle goes through the handle's [`TaskQueue`],
//! so their effects on the cache and the remote store happen in the order the
//! calls were made. Each call registers a cancellation token for its lifetime;
//! [`FileHandle::cancel`] trips all of them at once.
//!
//! Each operation comes in three shapes:
//!
//! - `*_async` returns a [`QueuedTask`] to await
//! - the plain form blocks the calling thread (synchronous callers only)
//! - `*_with_callback` delivers the result through the controller's
//!   [`MainDispatcher`](crate::MainDispatcher)

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use transfer::ProgressFn;

use crate::cancel::CancellationRegistry;
use crate::controller::{FileController, Payload};
use crate::dispatch::{deliver_on_main, progress_on_main};
use crate::error::{FileError, Result};
use crate::queue::{Predecessor, QueuedTask, TaskQueue};
use crate::record::FileRecord;
use crate::state::{FileState, DEFAULT_NAME};

/// Largest payload a handle accepts, in bytes.
pub const MAX_PAYLOAD_SIZE: u64 = 10 * 1024 * 1024;

fn check_size(size: u64) -> Result<()> {
    if size > MAX_PAYLOAD_SIZE {
        return Err(FileError::PayloadTooLarge {
            size,
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(())
}

/// Wait for the unit's turn, giving up as soon as it is cancelled.
async fn wait_turn(predecessor: Predecessor, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FileError::Cancelled),
        _ = predecessor => Ok(()),
    }
}

fn guess_mime_type(name: &str) -> Option<String> {
    mime_guess::from_path(name).first_raw().map(str::to_string)
}

struct Slot {
    state: Arc<FileState>,
    payload: Option<Payload>,
    /// When the remote copy was created, or when this handle first saw it.
    saved_at: Option<DateTime<Utc>>,
}

struct Inner {
    controller: Arc<FileController>,
    slot: RwLock<Slot>,
    queue: TaskQueue,
    cancellation: CancellationRegistry,
}

impl Inner {
    fn state(&self) -> Arc<FileState> {
        self.slot.read().state.clone()
    }

    fn progress(&self, progress: Option<ProgressFn>) -> Option<ProgressFn> {
        progress.map(|progress| progress_on_main(self.controller.dispatcher().clone(), progress))
    }

    async fn save(
        &self,
        cancel: &CancellationToken,
        progress: Option<ProgressFn>,
    ) -> Result<()> {
        let (state, payload) = {
            let slot = self.slot.read();
            (slot.state.clone(), slot.payload.clone())
        };
        // an earlier save may have finished while this one waited its turn
        if !state.is_dirty() {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(FileError::Cancelled);
        }
        let payload = payload.ok_or(FileError::MissingPayload)?;

        let saved = self.controller.save(&state, &payload, cancel, progress).await?;

        let mut slot = self.slot.write();
        slot.state = Arc::new(saved);
        slot.payload = None;
        slot.saved_at = Some(Utc::now());
        Ok(())
    }
}

pub struct FileHandle {
    inner: Arc<Inner>,
}

impl FileHandle {
    fn new(
        controller: &Arc<FileController>,
        state: FileState,
        payload: Option<Payload>,
        saved_at: Option<DateTime<Utc>>,
    ) -> Self {
        let queue = TaskQueue::new(controller.runtime().clone());
        let saved_at = saved_at.or_else(|| (!state.is_dirty()).then(Utc::now));
        Self {
            inner: Arc::new(Inner {
                controller: controller.clone(),
                slot: RwLock::new(Slot {
                    state: Arc::new(state),
                    payload,
                    saved_at,
                }),
                queue,
                cancellation: CancellationRegistry::new(),
            }),
        }
    }

    /// A dirty, unnamed file holding `data`.
    pub fn from_bytes(controller: &Arc<FileController>, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        check_size(data.len() as u64)?;
        let state = FileState::builder().build();
        Ok(Self::new(controller, state, Some(Payload::Bytes(data)), None))
    }

    /// A dirty file holding `data` under `name`.
    ///
    /// Without an explicit MIME type one is guessed from the name's extension.
    pub fn from_named_bytes(
        controller: &Arc<FileController>,
        name: impl Into<String>,
        mime_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Result<Self> {
        let data = data.into();
        check_size(data.len() as u64)?;

        let name = name.into();
        let mut builder = FileState::builder();
        if let Some(mime_type) = mime_type.or_else(|| guess_mime_type(&name)) {
            builder = builder.mime_type(mime_type);
        }
        let state = builder.name(name).build();
        Ok(Self::new(controller, state, Some(Payload::Bytes(data)), None))
    }

    /// A dirty file backed by a local file, uploaded from where it lies.
    pub fn from_path(controller: &Arc<FileController>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| FileError::io("stat", path, e))?;
        check_size(metadata.len())?;

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_NAME.to_string());
        let mut builder = FileState::builder();
        if let Some(mime_type) = guess_mime_type(&name) {
            builder = builder.mime_type(mime_type);
        }
        let state = builder.name(name).build();
        Ok(Self::new(
            controller,
            state,
            Some(Payload::File(path.to_path_buf())),
            None,
        ))
    }

    /// A clean file already stored remotely under `object_id`.
    pub fn from_remote(controller: &Arc<FileController>, object_id: &str) -> Self {
        let url = controller.location().url_for(object_id);
        let mut builder = FileState::builder().name(object_id).url(url);
        if let Some(mime_type) = guess_mime_type(object_id) {
            builder = builder.mime_type(mime_type);
        }
        Self::new(controller, builder.build(), None, None)
    }

    /// A handle around an existing state, with no local payload.
    pub fn from_state(controller: &Arc<FileController>, state: FileState) -> Self {
        Self::new(controller, state, None, None)
    }

    pub fn from_record(controller: &Arc<FileController>, record: &FileRecord) -> Self {
        let mut builder = FileState::builder()
            .name(record.name.as_str())
            .url(record.url.as_str());
        if let Some(mime_type) = &record.mime_type {
            builder = builder.mime_type(mime_type.as_str());
        }
        Self::new(controller, builder.build(), None, Some(record.created_at))
    }

    pub fn state(&self) -> Arc<FileState> {
        self.inner.state()
    }

    pub fn name(&self) -> String {
        self.state().name().to_string()
    }

    pub fn url(&self) -> Option<String> {
        self.state().url().map(str::to_string)
    }

    pub fn mime_type(&self) -> Option<String> {
        self.state().mime_type().map(str::to_string)
    }

    pub fn is_dirty(&self) -> bool {
        self.state().is_dirty()
    }

    pub fn is_cached(&self) -> bool {
        self.inner.controller.is_cached(&self.state())
    }

    /// Whether the content can be read without a download.
    pub fn is_data_available(&self) -> bool {
        let (state, has_payload) = {
            let slot = self.inner.slot.read();
            (slot.state.clone(), slot.payload.is_some())
        };
        has_payload || self.inner.controller.is_cached(&state)
    }

    /// A persistable reference to this file. `None` while dirty.
    pub fn record(&self) -> Option<FileRecord> {
        let slot = self.inner.slot.read();
        let url = slot.state.url()?;
        let key = self.inner.controller.location().object_id(url)?;
        Some(FileRecord {
            key: key.to_string(),
            name: slot.state.name().to_string(),
            mime_type: slot.state.mime_type().map(str::to_string),
            url: url.to_string(),
            created_at: slot.saved_at?,
        })
    }

    /// Upload the file if it is dirty.
    ///
    /// Resolves right away when the file is already clean. On success the
    /// handle becomes clean and drops its local payload; on failure it stays
    /// dirty with the payload intact, so saving again retries.
    pub fn save_async(&self, progress: Option<ProgressFn>) -> QueuedTask<()> {
        let inner = self.inner.clone();
        let progress = inner.progress(progress);
        let guard = inner.cancellation.register();
        let dirty = inner.state().is_dirty();

        self.inner.queue.enqueue(move |predecessor| async move {
            if !dirty {
                return Ok(());
            }
            wait_turn(predecessor, guard.token()).await?;
            inner.save(guard.token(), progress).await
        })
    }

    /// Blocking form of [`save_async`](Self::save_async).
    pub fn save(&self) -> Result<()> {
        self.save_async(None).wait()
    }

    pub fn save_with_callback<F>(&self, progress: Option<ProgressFn>, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.deliver(self.save_async(progress), callback);
    }

    /// Path of the cached copy, downloading it first if needed.
    pub fn get_file_async(&self, progress: Option<ProgressFn>) -> QueuedTask<PathBuf> {
        self.fetch_then(progress, |_, path| future::ready(Ok(path)))
    }

    pub fn get_file(&self) -> Result<PathBuf> {
        self.get_file_async(None).wait()
    }

    pub fn get_file_with_callback<F>(&self, progress: Option<ProgressFn>, callback: F)
    where
        F: FnOnce(Result<PathBuf>) + Send + 'static,
    {
        self.deliver(self.get_file_async(progress), callback);
    }

    /// Full content, read from the cache after fetching.
    pub fn get_data_async(&self, progress: Option<ProgressFn>) -> QueuedTask<Bytes> {
        self.fetch_then(progress, |controller, path| async move {
            controller.cache().read(&path).await
        })
    }

    pub fn get_data(&self) -> Result<Bytes> {
        self.get_data_async(None).wait()
    }

    pub fn get_data_with_callback<F>(&self, progress: Option<ProgressFn>, callback: F)
    where
        F: FnOnce(Result<Bytes>) + Send + 'static,
    {
        self.deliver(self.get_data_async(progress), callback);
    }

    /// The cached copy opened for reading, fetching it first if needed.
    pub fn get_data_stream_async(
        &self,
        progress: Option<ProgressFn>,
    ) -> QueuedTask<tokio::fs::File> {
        self.fetch_then(progress, |controller, path| async move {
            controller.cache().open(&path).await
        })
    }

    pub fn get_data_stream(&self) -> Result<tokio::fs::File> {
        self.get_data_stream_async(None).wait()
    }

    pub fn get_data_stream_with_callback<F>(&self, progress: Option<ProgressFn>, callback: F)
    where
        F: FnOnce(Result<tokio::fs::File>) + Send + 'static,
    {
        self.deliver(self.get_data_stream_async(progress), callback);
    }

    /// Cancel every operation in flight on this handle without waiting.
    ///
    /// Operations that already reached the remote store run to completion;
    /// the rest resolve as [`FileError::Cancelled`].
    pub fn cancel(&self) {
        self.inner.cancellation.cancel_all();
    }

    /// Number of operations started and not yet finished.
    pub fn pending_operations(&self) -> usize {
        self.inner.cancellation.live()
    }

    /// Block until every operation started so far has finished.
    pub fn wait_until_finished(&self) {
        self.inner.queue.wait_until_finished();
    }

    /// Resolves once every operation started so far has finished.
    pub async fn finished(&self) {
        self.inner.queue.finished().await;
    }

    /// Queue a fetch, then run `then` on the cached path inside the same unit.
    fn fetch_then<T, F, Fut>(&self, progress: Option<ProgressFn>, then: F) -> QueuedTask<T>
    where
        F: FnOnce(Arc<FileController>, PathBuf) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        let progress = inner.progress(progress);
        let guard = inner.cancellation.register();

        self.inner.queue.enqueue(move |predecessor| async move {
            wait_turn(predecessor, guard.token()).await?;

            // read after waiting, so a save queued earlier is visible
            let state = inner.state();
            let path = inner
                .controller
                .fetch(&state, guard.token(), progress)
                .await?;
            then(inner.controller.clone(), path).await
        })
    }

    fn deliver<T, F>(&self, task: QueuedTask<T>, callback: F)
    where
        T: Send + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let controller = &self.inner.controller;
        deliver_on_main(
            controller.runtime(),
            controller.dispatcher().clone(),
            task,
            callback,
        );
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        self.inner.cancellation.cancel_all();
    }
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.inner.slot.read();
        f.debug_struct("FileHandle")
            .field("state", &slot.state)
            .field("has_payload", &slot.payload.is_some())
            .field("queue", &self.inner.queue)
            .finish()
    }
}
