mod audio_store;
mod transcription_engine;

pub use audio_store::{AudioStore, AudioStoreError, StagedAudio};
pub use transcription_engine::{TranscriptionEngine, TranscriptionError};
