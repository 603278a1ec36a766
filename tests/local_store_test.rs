use std::io;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::{self, BoxStream};

use rec2text::application::ports::{AudioStore, AudioStoreError};
use rec2text::domain::{StoragePath, UploadId};
use rec2text::infrastructure::storage::LocalAudioStore;

fn chunks(parts: &[&'static [u8]]) -> BoxStream<'static, Result<Bytes, io::Error>> {
    let items: Vec<Result<Bytes, io::Error>> =
        parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
    stream::iter(items).boxed()
}

fn file_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

fn new_store() -> (tempfile::TempDir, LocalAudioStore) {
    let dir = tempfile::TempDir::new().unwrap();
    let store = LocalAudioStore::new(dir.path().join("staging")).unwrap();
    (dir, store)
}

#[tokio::test]
async fn given_complete_stream_when_stored_then_file_readable_at_local_path() {
    let (_dir, store) = new_store();
    let path = StoragePath::for_upload(&UploadId::new(), Some("clip.wav"));

    let staged = store
        .store(&path, chunks(&[b"RIFF", b"data"]), Some(8))
        .await
        .unwrap();

    assert_eq!(staged.path, path);
    assert_eq!(staged.size_bytes, 8);
    assert_eq!(std::fs::read(&staged.local_path).unwrap(), b"RIFFdata");
    assert_eq!(store.head(&path).await.unwrap(), 8);
    assert!(staged.local_path.starts_with(store.base_path()));
}

#[tokio::test]
async fn given_many_chunks_when_stored_then_bytes_concatenated_in_order() {
    let (_dir, store) = new_store();
    let path = StoragePath::for_upload(&UploadId::new(), None);
    let parts: Vec<Result<Bytes, io::Error>> = (0..50u8)
        .map(|i| Ok(Bytes::from(vec![i; 1000])))
        .collect();

    let staged = store
        .store(&path, stream::iter(parts).boxed(), None)
        .await
        .unwrap();

    let written = std::fs::read(&staged.local_path).unwrap();
    assert_eq!(written.len(), 50_000);
    assert_eq!(written[0], 0);
    assert_eq!(written[49_999], 49);
    assert_eq!(staged.size_bytes, 50_000);
}

#[tokio::test]
async fn given_stream_error_mid_upload_when_stored_then_nothing_left_behind() {
    let (dir, store) = new_store();
    let path = StoragePath::for_upload(&UploadId::new(), Some("clip.wav"));
    let parts: Vec<Result<Bytes, io::Error>> = vec![
        Ok(Bytes::from_static(b"first part")),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
    ];

    let err = store
        .store(&path, stream::iter(parts).boxed(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, AudioStoreError::Io(_)));
    assert!(store.head(&path).await.is_err());
    assert_eq!(file_count(&dir.path().join("staging")), 0);
}

#[tokio::test]
async fn given_declared_zero_length_when_stored_then_empty_upload_error() {
    let (_dir, store) = new_store();
    let path = StoragePath::for_upload(&UploadId::new(), None);

    let err = store.store(&path, chunks(&[]), Some(0)).await.unwrap_err();

    assert!(matches!(err, AudioStoreError::EmptyUpload));
}

#[tokio::test]
async fn given_stream_of_empty_chunks_when_stored_then_empty_upload_and_no_file() {
    let (dir, store) = new_store();
    let path = StoragePath::for_upload(&UploadId::new(), None);

    let err = store
        .store(&path, chunks(&[b"", b""]), None)
        .await
        .unwrap_err();

    assert!(matches!(err, AudioStoreError::EmptyUpload));
    assert_eq!(file_count(&dir.path().join("staging")), 0);
}

#[tokio::test]
async fn given_staged_upload_when_released_then_file_removed() {
    let (dir, store) = new_store();
    let path = StoragePath::for_upload(&UploadId::new(), Some("clip.flac"));
    let staged = store.store(&path, chunks(&[b"fLaC"]), Some(4)).await.unwrap();
    let local_path = staged.local_path.clone();

    store.release(staged).await.unwrap();

    assert!(!local_path.exists());
    assert!(matches!(
        store.head(&path).await,
        Err(AudioStoreError::NotFound(_))
    ));
    assert_eq!(file_count(&dir.path().join("staging")), 0);
}

#[tokio::test]
async fn given_file_already_gone_when_released_then_still_ok() {
    let (_dir, store) = new_store();
    let path = StoragePath::for_upload(&UploadId::new(), Some("clip.wav"));
    let staged = store.store(&path, chunks(&[b"data"]), Some(4)).await.unwrap();
    std::fs::remove_file(&staged.local_path).unwrap();

    assert!(store.release(staged).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn given_concurrent_uploads_when_stored_then_each_lands_at_its_own_path() {
    let (_dir, store) = new_store();
    let store = Arc::new(store);

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let path = StoragePath::for_upload(&UploadId::new(), Some("clip.wav"));
                let payload = Bytes::from(format!("upload-{}", i));
                let body = stream::iter(vec![Ok::<_, io::Error>(payload.clone())]).boxed();
                let staged = store.store(&path, body, None).await.unwrap();
                (payload, staged)
            })
        })
        .collect();

    let mut paths = std::collections::HashSet::new();
    for task in futures::future::join_all(tasks).await {
        let (payload, staged) = task.unwrap();
        assert_eq!(std::fs::read(&staged.local_path).unwrap(), payload.to_vec());
        assert!(paths.insert(staged.path.clone()));
    }
    assert_eq!(paths.len(), 16);
}

#[tokio::test]
async fn given_upload_in_progress_when_path_checked_then_not_visible_until_complete() {
    let (_dir, store) = new_store();
    let store = Arc::new(store);
    let path = StoragePath::for_upload(&UploadId::new(), Some("clip.wav"));
    let (tx, rx) = futures::channel::mpsc::unbounded::<Result<Bytes, io::Error>>();

    let writer = {
        let store = Arc::clone(&store);
        let path = path.clone();
        tokio::spawn(async move { store.store(&path, rx.boxed(), None).await })
    };

    tx.unbounded_send(Ok(Bytes::from_static(b"partial "))).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(store.head(&path).await.is_err());

    tx.unbounded_send(Ok(Bytes::from_static(b"recording"))).unwrap();
    drop(tx);

    let staged = writer.await.unwrap().unwrap();
    assert_eq!(
        std::fs::read(&staged.local_path).unwrap(),
        b"partial recording"
    );
    assert_eq!(store.head(&path).await.unwrap(), 17);
}
