mod audio_upload;
mod error_kind;
mod storage_path;
mod transcript;
mod transcription_stage;
mod upload_id;

pub use audio_upload::AudioUpload;
pub use error_kind::ErrorKind;
pub use storage_path::StoragePath;
pub use transcript::Transcript;
pub use transcription_stage::TranscriptionStage;
pub use upload_id::UploadId;
