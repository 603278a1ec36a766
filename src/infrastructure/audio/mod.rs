pub mod audio_decoder;
mod candle_whisper_engine;
mod mock_transcription_engine;
mod openai_whisper_engine;
mod serialized_engine;
mod transcription_engine_factory;

pub use candle_whisper_engine::{CandleWhisperEngine, read_mel_filters};
pub use mock_transcription_engine::MockTranscriptionEngine;
pub use openai_whisper_engine::OpenAiWhisperEngine;
pub use serialized_engine::SerializedEngine;
pub use transcription_engine_factory::{MOCK_TRANSCRIPT, TranscriptionEngineFactory};
