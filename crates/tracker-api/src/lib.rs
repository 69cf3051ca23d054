//! Asset Tracker API Library
//!
//! Router, handlers and service layer for the asset tracker REST API. The
//! `asset-tracker-api` binary wires these to a storage backend chosen from the
//! environment; tests drive [`build_router`] directly.

use asset_tracker_storage::DynStorageClient;
use axum::{
    routing::{get, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod audit;
pub mod config;
pub mod error;
pub mod health;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod track;
pub mod tracker;

pub use audit::{AuditLogger, AuditSeverity, StorageAuditLogger};
pub use error::ApiError;
pub use tracker::{TrackFilter, TrackerService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<TrackerService>,
    pub storage: Arc<DynStorageClient>,
}

impl AppState {
    pub fn new(storage: Arc<DynStorageClient>, audit: Arc<dyn AuditLogger>) -> Self {
        Self {
            tracker: Arc::new(TrackerService::new(Arc::clone(&storage), audit)),
            storage,
        }
    }

    /// State whose audit entries go to the same storage backend.
    pub fn from_storage(storage: Arc<DynStorageClient>) -> Self {
        let audit = Arc::new(StorageAuditLogger::new(Arc::clone(&storage)));
        Self::new(storage, audit)
    }
}

pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::liveness_check))
        .route("/ready", get(health::readiness_check))
        .route("/track", get(track::get_asset_tracker_events))
        .route(
            "/track/service/:service/asset/:asset/event/:event",
            put(track::deprecate_asset_track_entry),
        )
        .route("/track/storage/assets", get(track::get_datapoint_usage));

    #[cfg(feature = "metrics")]
    let router = router
        .route("/metrics", get(metrics::metrics_handler))
        .route_layer(axum::middleware::from_fn(metrics::track_metrics));

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
