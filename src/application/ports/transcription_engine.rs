use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

/// Turns one staged recording into text.
///
/// `audio_path` points at a fully written file that stays in place until the
/// call returns. Implementations read it themselves, so large uploads never
/// have to be copied through the orchestrator.
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: &str,
    ) -> Result<String, TranscriptionError>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("audio decoding failed: {0}")]
    DecodingFailed(String),
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("inference failed: {0}")]
    TranscriptionFailed(String),
    #[error("model loading failed: {0}")]
    ModelLoadFailed(String),
    #[error("remote recognizer failed: {0}")]
    ApiRequestFailed(String),
    #[error("inference exceeded {0:?}")]
    Timeout(Duration),
}
