use std::time::Duration;

use config::{Config, ConfigBuilder, ConfigError, File, FileFormat};
use config::Environment as EnvironmentSource;
use config::builder::DefaultState;
use serde::Deserialize;

use super::Environment;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub transcription: TranscriptionSettings,
    pub storage: StorageSettings,
    pub upload: UploadSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionSettings {
    pub provider: TranscriptionProviderSetting,
    pub model: String,
    pub language: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub inference_timeout_secs: u64,
    pub queue_timeout_secs: u64,
}

impl TranscriptionSettings {
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionProviderSetting {
    Local,
    #[serde(rename = "openai")]
    OpenAi,
    Mock,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub local_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    pub max_file_size_mb: usize,
    pub read_timeout_secs: u64,
}

impl UploadSettings {
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub enable_json: bool,
}

impl Settings {
    /// Defaults, then `appsettings.{Environment}` if present, then `APP_*`
    /// variables (`APP_SERVER__PORT=9100`).
    pub fn load(environment: Environment) -> Result<Self, ConfigError> {
        Self::builder(environment)?.build()?.try_deserialize()
    }

    /// Same layering as [`Settings::load`] with `contents` applied last.
    pub fn from_toml_str(environment: Environment, contents: &str) -> Result<Self, ConfigError> {
        Self::builder(environment)?
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn builder(environment: Environment) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let default_storage = std::env::temp_dir().join("rec2text");

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 9000_i64)?
            .set_default("transcription.provider", "local")?
            .set_default("transcription.model", "openai/whisper-medium.en")?
            .set_default("transcription.language", "en")?
            .set_default("transcription.inference_timeout_secs", 300_i64)?
            .set_default("transcription.queue_timeout_secs", 900_i64)?
            .set_default(
                "storage.local_path",
                default_storage.to_string_lossy().to_string(),
            )?
            .set_default("upload.max_file_size_mb", 25_i64)?
            .set_default("upload.read_timeout_secs", 30_i64)?
            .set_default("logging.level", crate::infrastructure::observability::DEFAULT_FILTER)?
            .set_default("logging.enable_json", false)?
            .add_source(
                File::with_name(&environment.settings_file()).required(false),
            )
            .add_source(
                EnvironmentSource::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        Ok(builder)
    }
}
