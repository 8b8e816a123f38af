//! Shared harness for jax-file integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jax_file::{
    FileController, ImmediateDispatcher, MainDispatcher, ProgressFn, RemoteLocation,
    RemoteTransfer, TransferError, TransferProgress,
};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::runtime::Handle;

pub const BASE_URL: &str = "https://s3.example.com";
pub const BUCKET: &str = "files";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Upload { key: String, data: Vec<u8> },
    Download { key: String },
}

/// In-memory remote store that records every call made to it.
#[derive(Default)]
pub struct RecordingTransfer {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<Call>>,
    fail_uploads: AtomicBool,
    fail_downloads: AtomicBool,
    upload_id: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
}

impl RecordingTransfer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn uploads(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Upload { .. }))
            .count()
    }

    pub fn downloads(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Download { .. }))
            .count()
    }

    /// Make the store hold `data` under `key`, as if uploaded elsewhere.
    pub fn insert(&self, key: &str, data: &[u8]) {
        self.objects.lock().insert(key.to_string(), data.to_vec());
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(key).cloned()
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::SeqCst);
    }

    /// Report `id` as the object id of every later upload.
    pub fn set_upload_id(&self, id: &str) {
        *self.upload_id.lock() = Some(id.to_string());
    }

    /// Sleep this long inside every transfer.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    async fn pause(&self) {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RemoteTransfer for RecordingTransfer {
    async fn upload(
        &self,
        key: &str,
        source: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<String, TransferError> {
        let data = tokio::fs::read(source)
            .await
            .map_err(|e| TransferError::Failed(e.to_string()))?;
        self.calls.lock().push(Call::Upload {
            key: key.to_string(),
            data: data.clone(),
        });

        let total = data.len() as u64;
        if let Some(progress) = &progress {
            progress(TransferProgress::new(0, total));
        }
        self.pause().await;

        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(TransferError::Failed("upload rejected".to_string()));
        }

        let object_id = self
            .upload_id
            .lock()
            .clone()
            .unwrap_or_else(|| key.to_string());
        self.objects.lock().insert(object_id.clone(), data);
        if let Some(progress) = &progress {
            progress(TransferProgress::new(total, total));
        }
        Ok(object_id)
    }

    async fn download(
        &self,
        key: &str,
        dest: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<(), TransferError> {
        self.calls.lock().push(Call::Download {
            key: key.to_string(),
        });
        self.pause().await;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::Failed(e.to_string()))?;
        }
        if self.fail_downloads.load(Ordering::SeqCst) {
            // leave a partial file behind, like a connection dropped mid-body
            tokio::fs::write(dest, b"partial")
                .await
                .map_err(|e| TransferError::Failed(e.to_string()))?;
            return Err(TransferError::Failed("download interrupted".to_string()));
        }

        let data = self
            .object(key)
            .ok_or_else(|| TransferError::Failed(format!("no object {}", key)))?;
        tokio::fs::write(dest, &data)
            .await
            .map_err(|e| TransferError::Failed(e.to_string()))?;

        let total = data.len() as u64;
        if let Some(progress) = &progress {
            progress(TransferProgress::new(total, total));
        }
        Ok(())
    }
}

pub struct TestEnv {
    pub controller: Arc<FileController>,
    pub transfer: Arc<RecordingTransfer>,
    pub temp: TempDir,
}

impl TestEnv {
    pub fn cache_dir(&self) -> PathBuf {
        self.temp.path().join("cache")
    }

    /// Entries currently in the cache directory, sorted.
    pub fn cache_entries(&self) -> Vec<String> {
        let mut entries: Vec<String> = match std::fs::read_dir(self.cache_dir()) {
            Ok(entries) => entries
                .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        entries.sort();
        entries
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("jax_file=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Controller over a recording transfer, delivering callbacks inline on the
/// current runtime.
pub fn setup() -> TestEnv {
    setup_with(Arc::new(ImmediateDispatcher), None)
}

pub fn setup_with(dispatcher: Arc<dyn MainDispatcher>, runtime: Option<Handle>) -> TestEnv {
    init_tracing();

    let temp = tempfile::tempdir().unwrap();
    let transfer = RecordingTransfer::new();
    let mut builder = FileController::builder()
        .cache_dir(temp.path().join("cache"))
        .location(RemoteLocation::new(BASE_URL, BUCKET))
        .transfer(transfer.clone())
        .dispatcher(dispatcher);
    if let Some(runtime) = runtime {
        builder = builder.runtime(runtime);
    }

    TestEnv {
        controller: Arc::new(builder.build().unwrap()),
        transfer,
        temp,
    }
}
