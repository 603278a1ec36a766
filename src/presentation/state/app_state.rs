use std::sync::Arc;

use crate::application::services::TranscriptionService;
use crate::presentation::config::UploadSettings;

#[derive(Clone)]
pub struct AppState {
    pub transcription_service: Arc<TranscriptionService>,
    pub upload: UploadSettings,
}
