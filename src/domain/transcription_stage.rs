use std::fmt;

/// Lifecycle of one transcription request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranscriptionStage {
    Received,
    Stored,
    Transcribing,
    Succeeded,
    Failed,
}

impl TranscriptionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptionStage::Received => "RECEIVED",
            TranscriptionStage::Stored => "STORED",
            TranscriptionStage::Transcribing => "TRANSCRIBING",
            TranscriptionStage::Succeeded => "SUCCEEDED",
            TranscriptionStage::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TranscriptionStage::Succeeded | TranscriptionStage::Failed
        )
    }
}

impl fmt::Display for TranscriptionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
