use std::path::Path;

use async_trait::async_trait;

use crate::application::ports::{TranscriptionEngine, TranscriptionError};

/// Returns a canned transcript without touching the audio. Used in scaffold
/// mode to exercise the pipeline without a model.
pub struct MockTranscriptionEngine {
    transcript: String,
}

impl MockTranscriptionEngine {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
        }
    }
}

#[async_trait]
impl TranscriptionEngine for MockTranscriptionEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn transcribe(
        &self,
        audio_path: &Path,
        _language: &str,
    ) -> Result<String, TranscriptionError> {
        let metadata = tokio::fs::metadata(audio_path)
            .await
            .map_err(|e| TranscriptionError::DecodingFailed(format!("read audio: {}", e)))?;
        tracing::debug!(bytes = metadata.len(), "Mock transcription");
        Ok(self.transcript.clone())
    }
}
