use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cinematch_api::{
    api::{create_router, AppState},
    cache::DiskPosterStore,
    config::Config,
    services::{PacedCatalog, ProviderRegistry, RequestScheduler, RetryPolicy, TmdbClient},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(env_filter)
        .init();

    let config = Config::from_env()?;
    tracing::info!(host = %config.host, port = config.port, "Configuration loaded");

    let catalog = PacedCatalog::new(
        Arc::new(TmdbClient::from_config(&config)),
        RequestScheduler::new(config.request_interval()),
        RetryPolicy::default(),
    );
    let providers = ProviderRegistry::from_config(&config);
    let (posters, poster_writer) = DiskPosterStore::new(config.poster_cache_dir.clone());

    let state = AppState::from_config(&config, catalog, providers, Arc::new(posters));
    let app = create_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!(address = %address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    poster_writer.shutdown().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Received shutdown signal");
}
