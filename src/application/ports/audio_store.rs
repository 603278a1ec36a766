use std::io;
use std::path::PathBuf;

use bytes::Bytes;
use futures::stream::BoxStream;

use crate::domain::StoragePath;

/// A fully written upload. Exists only after the store has completed the
/// write, and is consumed by [`AudioStore::release`].
#[derive(Debug, PartialEq, Eq)]
pub struct StagedAudio {
    pub path: StoragePath,
    pub local_path: PathBuf,
    pub size_bytes: u64,
}

#[async_trait::async_trait]
pub trait AudioStore: Send + Sync {
    /// Writes the whole stream to `path`. The returned handle is only
    /// produced once every byte is in place; on error nothing is left behind.
    async fn store(
        &self,
        path: &StoragePath,
        stream: BoxStream<'_, Result<Bytes, io::Error>>,
        content_length: Option<u64>,
    ) -> Result<StagedAudio, AudioStoreError>;

    /// Deletes a staged upload. Deleting an object that is already gone is
    /// not an error.
    async fn release(&self, staged: StagedAudio) -> Result<(), AudioStoreError>;

    async fn head(&self, path: &StoragePath) -> Result<u64, AudioStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AudioStoreError {
    #[error("upload is empty")]
    EmptyUpload,
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("delete failed: {0}")]
    DeleteFailed(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
