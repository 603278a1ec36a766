use crate::presentation::config::{Environment, LoggingSettings};

pub const DEFAULT_FILTER: &str = "info,rec2text=debug,tower_http=debug";
pub const LOG_FORMAT_VAR: &str = "LOG_FORMAT";

/// Configuration for tracing initialization.
pub struct TracingConfig {
    pub environment: String,
    pub json_format: bool,
    pub default_filter: String,
}

impl TracingConfig {
    /// `LOG_FORMAT=json` forces JSON output even when settings ask for text.
    pub fn from_settings(environment: Environment, logging: &LoggingSettings) -> Self {
        let log_format = std::env::var(LOG_FORMAT_VAR).ok();
        Self::resolve(environment, logging, log_format.as_deref())
    }

    pub fn resolve(
        environment: Environment,
        logging: &LoggingSettings,
        log_format: Option<&str>,
    ) -> Self {
        let forced_json = log_format.is_some_and(|v| v.trim().eq_ignore_ascii_case("json"));
        Self {
            environment: environment.as_str().to_string(),
            json_format: logging.enable_json || forced_json,
            default_filter: logging.level.clone(),
        }
    }
}
