mod transcription_service;

pub use transcription_service::{
    NO_SPEECH_DETECTED, TranscriptionService, TranscriptionServiceError,
};
