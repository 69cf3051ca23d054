//! Asset Tracker API Server
//!
//! REST API for listing and deprecating asset tracker records.

use asset_tracker_api::{build_router, config::ServerConfig, AppState};
use asset_tracker_storage::storage_from_uri;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    let storage = storage_from_uri(&config.storage_uri).unwrap_or_else(|e| {
        tracing::error!("Failed to open storage '{}': {}", config.storage_uri, e);
        std::process::exit(1);
    });
    tracing::info!("Using asset tracker storage at: {}", storage.location());

    let app = build_router(AppState::from_storage(Arc::new(storage)));

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        });
    tracing::info!("Asset tracker API listening on {}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
