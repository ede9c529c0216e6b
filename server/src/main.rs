//! Folio Server - Main Entry Point

use anyhow::Result;
use tracing::info;

use folio_server::{api, config, webhooks};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Folio Server"
    );

    let service = webhooks::WebhookService::new(config.webhook.clone())?;
    info!(
        timeout_secs = config.webhook.request_timeout.as_secs(),
        max_attempts = config.webhook.max_attempts,
        "Webhook delivery engine initialized"
    );

    let cleanup = webhooks::spawn_cleanup_task(
        service.clone(),
        config.webhook.cleanup_interval,
        config.webhook.retention_days,
    );

    // Build router
    let state = api::AppState::new(service.clone());
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    cleanup.abort();
    let dropped_retries = service.scheduled_retries().len();
    service.shutdown();
    info!(dropped_retries, "Server shutdown complete");

    Ok(())
}
