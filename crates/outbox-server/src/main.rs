//! Outbox worker entry point.

use std::error::Error;
use std::sync::Arc;

use outbox_accounts::LogMailer;
use outbox_couchdb::CouchDocumentStore;
use outbox_server::config::AppConfig;
use outbox_server::state::AppState;
use outbox_server::worker::Worker;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting outbox worker");

    let config = AppConfig::from_env()?;
    let addr = config.server.addr()?;

    // Connect and install the change-feed filters before any pump subscribes.
    let store = CouchDocumentStore::new(config.couch.clone())?;
    store.bootstrap().await?;
    tracing::info!(database = store.database(), "CouchDB ready");

    let worker = Arc::new(
        Worker::start(
            Arc::new(store),
            Arc::new(LogMailer),
            &config.server.verification_url,
            config.pumps.clone(),
        )
        .await?,
    );

    let app = outbox_server::app(AppState::new(Arc::clone(&worker)));
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    worker.shutdown().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
