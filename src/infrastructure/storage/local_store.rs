use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use object_store::local::LocalFileSystem;
use object_store::path::Path as StorePath;
use object_store::{MultipartUpload, ObjectStore, PutPayload};

use crate::application::ports::{AudioStore, AudioStoreError, StagedAudio};
use crate::domain::StoragePath;

/// Stages uploads on the local filesystem.
///
/// Writes go through `put_multipart`, which fills a private staging file
/// and renames it onto the final path in `complete()`. A reader can
/// therefore never observe a partially written upload at `path`.
pub struct LocalAudioStore {
    inner: Arc<LocalFileSystem>,
    base_path: PathBuf,
}

impl LocalAudioStore {
    pub fn new(base_path: PathBuf) -> Result<Self, AudioStoreError> {
        std::fs::create_dir_all(&base_path).map_err(AudioStoreError::Io)?;
        let fs = LocalFileSystem::new_with_prefix(&base_path)
            .map_err(|e| AudioStoreError::WriteFailed(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(fs),
            base_path,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[async_trait::async_trait]
impl AudioStore for LocalAudioStore {
    async fn store(
        &self,
        path: &StoragePath,
        mut stream: BoxStream<'_, Result<Bytes, io::Error>>,
        content_length: Option<u64>,
    ) -> Result<StagedAudio, AudioStoreError> {
        if content_length == Some(0) {
            return Err(AudioStoreError::EmptyUpload);
        }

        let store_path = StorePath::from(path.as_str());
        let local_path = self
            .inner
            .path_to_filesystem(&store_path)
            .map_err(|e| AudioStoreError::WriteFailed(e.to_string()))?;

        let mut upload = self
            .inner
            .put_multipart(&store_path)
            .await
            .map_err(|e| AudioStoreError::WriteFailed(e.to_string()))?;

        let mut total_bytes: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    let _ = upload.abort().await;
                    return Err(AudioStoreError::Io(e));
                }
            };
            if bytes.is_empty() {
                continue;
            }
            total_bytes += bytes.len() as u64;
            if let Err(e) = upload.put_part(PutPayload::from(bytes)).await {
                let _ = upload.abort().await;
                return Err(AudioStoreError::WriteFailed(e.to_string()));
            }
        }

        if total_bytes == 0 {
            let _ = upload.abort().await;
            return Err(AudioStoreError::EmptyUpload);
        }

        upload
            .complete()
            .await
            .map_err(|e| AudioStoreError::WriteFailed(e.to_string()))?;

        tracing::debug!(path = %path, bytes = total_bytes, "Upload staged");

        Ok(StagedAudio {
            path: path.clone(),
            local_path,
            size_bytes: total_bytes,
        })
    }

    async fn release(&self, staged: StagedAudio) -> Result<(), AudioStoreError> {
        let store_path = StorePath::from(staged.path.as_str());
        match self.inner.delete(&store_path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(AudioStoreError::DeleteFailed(e.to_string())),
        }
    }

    async fn head(&self, path: &StoragePath) -> Result<u64, AudioStoreError> {
        let store_path = StorePath::from(path.as_str());
        let meta = self
            .inner
            .head(&store_path)
            .await
            .map_err(|e| AudioStoreError::NotFound(e.to_string()))?;
        Ok(meta.size as u64)
    }
}
