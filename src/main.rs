use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use rec2text::application::services::TranscriptionService;
use rec2text::infrastructure::audio::TranscriptionEngineFactory;
use rec2text::infrastructure::observability::{TracingConfig, init_tracing};
use rec2text::infrastructure::storage::LocalAudioStore;
use rec2text::presentation::{
    AppState, Environment, ScaffoldConfig, Settings, TranscriptionProviderSetting, create_router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;
    let mut settings = Settings::load(environment).context("Failed to load settings")?;

    init_tracing(
        TracingConfig::from_settings(environment, &settings.logging),
        settings.server.port,
    );

    if ScaffoldConfig::default().enabled {
        tracing::warn!("Scaffold mode enabled, using mock transcription engine");
        settings.transcription.provider = TranscriptionProviderSetting::Mock;
    }

    let audio_store = Arc::new(
        LocalAudioStore::new(PathBuf::from(&settings.storage.local_path))
            .context("Failed to prepare temporary audio directory")?,
    );
    tracing::info!(path = %audio_store.base_path().display(), "Audio staging directory ready");

    // Model download and weight loading are blocking
    let transcription_settings = settings.transcription.clone();
    let engine = tokio::task::spawn_blocking(move || {
        TranscriptionEngineFactory::create(&transcription_settings)
    })
    .await
    .context("Engine loader task failed")?
    .context("Failed to load transcription engine")?;

    let transcription_service = Arc::new(TranscriptionService::new(
        audio_store,
        engine,
        settings.transcription.language.clone(),
    ));

    let state = AppState {
        transcription_service,
        upload: settings.upload.clone(),
    };

    let router = create_router(state);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server address")?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
