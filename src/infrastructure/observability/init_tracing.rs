use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use super::{DEFAULT_FILTER, TracingConfig};

/// Installs the global subscriber. `RUST_LOG` overrides the configured filter.
pub fn init_tracing(config: TracingConfig, port: u16) {
    let filter = build_filter(&config.default_filter);

    // Exactly one of the two is Some; a None layer is a no-op
    let (json_layer, text_layer) = if config.json_format {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true);
        (Some(layer), None)
    } else {
        let layer = fmt::layer().with_target(true).with_line_number(true);
        (None, Some(layer))
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init();

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
        return;
    }

    tracing::info!(
        port,
        environment = %config.environment,
        json_format = config.json_format,
        "Tracing initialized"
    );
}

pub fn build_filter(configured: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
