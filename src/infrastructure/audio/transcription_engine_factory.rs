use std::sync::Arc;

use crate::application::ports::{TranscriptionEngine, TranscriptionError};
use crate::presentation::config::{TranscriptionProviderSetting, TranscriptionSettings};

use super::candle_whisper_engine::CandleWhisperEngine;
use super::mock_transcription_engine::MockTranscriptionEngine;
use super::openai_whisper_engine::OpenAiWhisperEngine;
use super::serialized_engine::SerializedEngine;

pub const MOCK_TRANSCRIPT: &str = "mock transcription";

pub struct TranscriptionEngineFactory;

impl TranscriptionEngineFactory {
    /// Loads the configured engine once and wraps it in the single-flight
    /// gate. The returned handle is shared by every request.
    pub fn create(
        settings: &TranscriptionSettings,
    ) -> Result<Arc<dyn TranscriptionEngine>, TranscriptionError> {
        let engine: Arc<dyn TranscriptionEngine> = match settings.provider {
            TranscriptionProviderSetting::Local => {
                Arc::new(CandleWhisperEngine::new(&settings.model)?)
            }
            TranscriptionProviderSetting::OpenAi => {
                let key = settings.api_key.clone().ok_or_else(|| {
                    TranscriptionError::ModelLoadFailed(
                        "API key required for OpenAI Whisper".to_string(),
                    )
                })?;
                Arc::new(OpenAiWhisperEngine::new(
                    key,
                    settings.base_url.clone(),
                    Some(settings.model.clone()),
                ))
            }
            TranscriptionProviderSetting::Mock => {
                Arc::new(MockTranscriptionEngine::new(MOCK_TRANSCRIPT))
            }
        };

        tracing::info!(
            engine = engine.name(),
            model = %settings.model,
            language = %settings.language,
            inference_timeout_secs = settings.inference_timeout_secs,
            queue_timeout_secs = settings.queue_timeout_secs,
            "Transcription engine ready"
        );

        Ok(Arc::new(
            SerializedEngine::new(engine, settings.inference_timeout())
                .with_queue_timeout(settings.queue_timeout()),
        ))
    }
}
