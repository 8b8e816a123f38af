//! Integration tests for saving file handles

mod common;

use std::sync::Arc;

use common::{Call, BASE_URL, BUCKET};
use jax_file::{FileError, FileHandle, FileRecord, FileState, ProgressFn, TransferProgress};
use parking_lot::Mutex;

#[tokio::test]
async fn test_save_bytes_becomes_clean() {
    let env = common::setup();
    env.transfer.set_upload_id("abc");

    let file = FileHandle::from_bytes(&env.controller, vec![1u8, 2, 3, 4, 5]).unwrap();
    assert!(file.is_dirty());
    assert!(file.url().is_none());

    file.save_async(None).await.unwrap();

    assert!(!file.is_dirty());
    let url = file.url().unwrap();
    assert!(url.contains("abc"));
    assert_eq!(url, format!("{}/{}/abc", BASE_URL, BUCKET));
    assert_eq!(env.transfer.object("abc").unwrap(), vec![1, 2, 3, 4, 5]);

    // the in-memory payload is gone; only the cache could provide the data now
    env.controller.clear_cache().await.unwrap();
    assert!(!file.is_data_available());
}

#[tokio::test]
async fn test_clean_file_is_not_uploaded_again() {
    let env = common::setup();
    let file = FileHandle::from_named_bytes(&env.controller, "a.txt", None, &b"hello"[..]).unwrap();

    file.save_async(None).await.unwrap();
    let url = file.url();
    file.save_async(None).await.unwrap();
    file.save_async(None).await.unwrap();

    assert_eq!(env.transfer.uploads(), 1);
    assert_eq!(file.url(), url);
}

#[tokio::test]
async fn test_upload_key_format() {
    let env = common::setup();
    let file =
        FileHandle::from_named_bytes(&env.controller, "notes.txt", None, &b"hello"[..]).unwrap();
    file.save_async(None).await.unwrap();

    let calls = env.transfer.calls();
    let Call::Upload { key, data } = &calls[0] else {
        panic!("expected an upload, got {:?}", calls[0]);
    };
    assert_eq!(data, b"hello");

    let id = key
        .strip_prefix("file/")
        .and_then(|rest| rest.strip_suffix("-notes.txt"))
        .unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());

    // the returned object id becomes the last part of the url
    assert_eq!(file.url().unwrap(), format!("{}/{}/{}", BASE_URL, BUCKET, key));
    assert_eq!(file.mime_type().as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn test_failed_upload_keeps_payload_for_retry() {
    let env = common::setup();
    env.transfer.set_fail_uploads(true);

    let file = FileHandle::from_bytes(&env.controller, &b"retry me"[..]).unwrap();
    let err = file.save_async(None).await.unwrap_err();
    assert!(matches!(err, FileError::TransferFailed(_)));
    assert!(file.is_dirty());
    assert!(file.is_data_available());

    env.transfer.set_fail_uploads(false);
    file.save_async(None).await.unwrap();

    assert!(!file.is_dirty());
    let calls = env.transfer.calls();
    assert_eq!(calls.len(), 2);
    for call in calls {
        assert!(matches!(call, Call::Upload { data, .. } if data == b"retry me"));
    }
}

#[tokio::test]
async fn test_save_from_path() {
    let env = common::setup();
    let source = env.temp.path().join("report.pdf");
    std::fs::write(&source, b"%PDF-1.4").unwrap();

    let file = FileHandle::from_path(&env.controller, &source).unwrap();
    assert_eq!(file.name(), "report.pdf");
    assert_eq!(file.mime_type().as_deref(), Some("application/pdf"));

    file.save_async(None).await.unwrap();
    assert!(!file.is_dirty());

    // uploaded straight from the source file, the cache is left alone
    assert!(!file.is_cached());
    assert!(source.exists());

    let data = file.get_data_async(None).await.unwrap();
    assert_eq!(&data[..], b"%PDF-1.4");
    assert_eq!(env.transfer.downloads(), 1);
}

#[tokio::test]
async fn test_dirty_state_without_payload() {
    let env = common::setup();
    let state = FileState::builder().name("ghost.bin").build();
    let file = FileHandle::from_state(&env.controller, state);

    let err = file.save_async(None).await.unwrap_err();
    assert!(matches!(err, FileError::MissingPayload));
    assert_eq!(env.transfer.uploads(), 0);
}

#[tokio::test]
async fn test_upload_progress() {
    let env = common::setup();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let progress: ProgressFn = Arc::new(move |event: TransferProgress| sink.lock().push(event));

    let file = FileHandle::from_bytes(&env.controller, vec![0u8; 5]).unwrap();
    file.save_async(Some(progress)).await.unwrap();

    let seen = seen.lock();
    assert_eq!(
        *seen,
        vec![TransferProgress::new(0, 5), TransferProgress::new(5, 5)]
    );
    assert_eq!(seen.last().unwrap().percent(), 100);
}

#[tokio::test]
async fn test_record_after_save() -> anyhow::Result<()> {
    let env = common::setup();
    let file = FileHandle::from_named_bytes(&env.controller, "a.txt", None, &b"hello"[..])?;
    assert!(file.record().is_none());

    file.save_async(None).await?;
    let record = file.record().expect("clean file has a record");
    assert_eq!(record.name, "a.txt");
    assert_eq!(Some(record.url.clone()), file.url());
    assert!(record.key.starts_with("file/"));

    // a handle rebuilt from the record reads the same remote object
    let json = serde_json::to_string(&record)?;
    let decoded: FileRecord = serde_json::from_str(&json)?;
    let restored = FileHandle::from_record(&env.controller, &decoded);
    assert!(!restored.is_dirty());
    assert_eq!(restored.record(), Some(record));

    env.controller.clear_cache().await?;
    let data = restored.get_data_async(None).await?;
    assert_eq!(&data[..], b"hello");
    Ok(())
}
