pub mod config;
pub mod handlers;
pub mod router;
pub mod state;

pub use config::{
    Environment, ScaffoldConfig, Settings, TranscriptionProviderSetting, TranscriptionSettings,
    UploadSettings,
};
pub use router::create_router;
pub use state::AppState;
