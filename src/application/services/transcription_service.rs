use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::{future, stream};

use crate::application::ports::{
    AudioStore, AudioStoreError, StagedAudio, TranscriptionEngine, TranscriptionError,
};
use crate::domain::{
    AudioUpload, ErrorKind, StoragePath, Transcript, TranscriptionStage, UploadId,
};
use crate::infrastructure::observability::preview_transcript;

pub const NO_SPEECH_DETECTED: &str = "no speech detected";

/// Drives one upload through store, transcribe and release.
///
/// The engine handle is shared by every request; serialization of inference
/// is the engine adapter's job, so nothing here takes a lock.
pub struct TranscriptionService {
    audio_store: Arc<dyn AudioStore>,
    engine: Arc<dyn TranscriptionEngine>,
    language: String,
}

impl TranscriptionService {
    pub fn new(
        audio_store: Arc<dyn AudioStore>,
        engine: Arc<dyn TranscriptionEngine>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            audio_store,
            engine,
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub async fn transcribe(
        &self,
        upload: AudioUpload,
    ) -> Result<Transcript, TranscriptionServiceError> {
        let upload_id = UploadId::new();
        self.run(upload_id, upload).await
    }

    #[tracing::instrument(
        name = "transcription",
        skip_all,
        fields(upload_id = %upload_id.as_uuid(), bytes = upload.len())
    )]
    async fn run(
        &self,
        upload_id: UploadId,
        upload: AudioUpload,
    ) -> Result<Transcript, TranscriptionServiceError> {
        let started = Instant::now();
        enter_stage(TranscriptionStage::Received);

        let path = StoragePath::for_upload(&upload_id, upload.filename.as_deref());
        let content_length = upload.len() as u64;
        let body = stream::once(future::ready(Ok(upload.data))).boxed();

        let staged = match self.audio_store.store(&path, body, Some(content_length)).await {
            Ok(staged) => staged,
            Err(e) => {
                enter_stage(TranscriptionStage::Failed);
                tracing::error!(error = %e, path = %path, "Failed to stage upload");
                return Err(TranscriptionServiceError::Storage(e));
            }
        };
        enter_stage(TranscriptionStage::Stored);

        let local_path = staged.local_path.clone();
        let guard = StagedGuard::new(Arc::clone(&self.audio_store), staged);

        enter_stage(TranscriptionStage::Transcribing);
        let outcome = self.engine.transcribe(&local_path, &self.language).await;

        guard.release().await;

        let outcome = outcome.and_then(|text| {
            let text = text.trim();
            if text.is_empty() {
                Err(TranscriptionError::TranscriptionFailed(
                    NO_SPEECH_DETECTED.to_string(),
                ))
            } else {
                Ok(text.to_string())
            }
        });

        match outcome {
            Ok(text) => {
                enter_stage(TranscriptionStage::Succeeded);
                tracing::info!(
                    chars = text.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    preview = %preview_transcript(&text),
                    "Transcription completed"
                );
                Ok(Transcript { upload_id, text })
            }
            Err(e) => {
                enter_stage(TranscriptionStage::Failed);
                tracing::error!(
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Transcription failed"
                );
                Err(e.into())
            }
        }
    }
}

fn enter_stage(stage: TranscriptionStage) {
    tracing::debug!(stage = %stage, terminal = stage.is_terminal(), "Transcription stage transition");
}

/// Owns a staged upload until it is released.
///
/// The happy path calls [`StagedGuard::release`]. If the request future is
/// dropped first (client disconnect, cancelled task) the drop hands the
/// release to the runtime so the file still goes away.
struct StagedGuard {
    audio_store: Arc<dyn AudioStore>,
    staged: Option<StagedAudio>,
}

impl StagedGuard {
    fn new(audio_store: Arc<dyn AudioStore>, staged: StagedAudio) -> Self {
        Self {
            audio_store,
            staged: Some(staged),
        }
    }

    async fn release(mut self) {
        if let Some(staged) = self.staged.take() {
            release_staged(self.audio_store.as_ref(), staged).await;
        }
    }
}

impl Drop for StagedGuard {
    fn drop(&mut self) {
        let Some(staged) = self.staged.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(path = %staged.path, "Request dropped before release, releasing in background");
                let audio_store = Arc::clone(&self.audio_store);
                handle.spawn(async move {
                    release_staged(audio_store.as_ref(), staged).await;
                });
            }
            Err(_) => {
                tracing::error!(
                    path = %staged.path,
                    local_path = %staged.local_path.display(),
                    "No runtime available to release staged upload"
                );
            }
        }
    }
}

async fn release_staged(audio_store: &dyn AudioStore, staged: StagedAudio) {
    let path = staged.path.clone();
    match audio_store.release(staged).await {
        Ok(()) => tracing::debug!(path = %path, "Staged upload released"),
        Err(e) => tracing::warn!(error = %e, path = %path, "Failed to release staged upload"),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionServiceError {
    #[error("storage: {0}")]
    Storage(#[from] AudioStoreError),
    #[error("recognition: {0}")]
    Recognition(TranscriptionError),
    #[error("inference timed out after {0:?}")]
    Timeout(Duration),
}

impl TranscriptionServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranscriptionServiceError::Storage(_) => ErrorKind::StorageError,
            TranscriptionServiceError::Recognition(_) => ErrorKind::RecognitionError,
            TranscriptionServiceError::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

impl From<TranscriptionError> for TranscriptionServiceError {
    fn from(error: TranscriptionError) -> Self {
        match error {
            TranscriptionError::Timeout(after) => TranscriptionServiceError::Timeout(after),
            other => TranscriptionServiceError::Recognition(other),
        }
    }
}
