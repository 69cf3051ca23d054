//! HTTP handlers for the `/track` routes.

use asset_tracker_core::{DatapointUsage, TrackingKey, TrackingRecord};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::tracker::{TrackFilter, DEPRECATED_MESSAGE};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackResponse {
    pub track: Vec<TrackingRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: String,
}

/// `GET /track` with optional `asset`, `event` and `service` filters
pub async fn get_asset_tracker_events(
    State(state): State<AppState>,
    Query(filter): Query<TrackFilter>,
) -> Result<Json<TrackResponse>, ApiError> {
    let result = state.tracker.list_records(&filter).await;
    observe(TrackerOperation::List, &result);

    let track = result?;
    tracing::debug!(count = track.len(), "Listed asset tracker records");
    Ok(Json(TrackResponse { track }))
}

/// `PUT /track/service/:service/asset/:asset/event/:event`
pub async fn deprecate_asset_track_entry(
    State(state): State<AppState>,
    Path((service, asset, event)): Path<(String, String, String)>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let key = TrackingKey::new(service, asset, event);
    let result = state.tracker.deprecate(&key).await;
    observe(TrackerOperation::Deprecate, &result);

    result?;
    Ok(Json(SuccessResponse {
        success: DEPRECATED_MESSAGE.to_string(),
    }))
}

/// `GET /track/storage/assets`
pub async fn get_datapoint_usage(
    State(state): State<AppState>,
) -> Result<Json<DatapointUsage>, ApiError> {
    let result = state.tracker.datapoint_usage().await;
    observe(TrackerOperation::Usage, &result);

    Ok(Json(result?))
}

/// Operations counted per outcome when metrics are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerOperation {
    List,
    Deprecate,
    Usage,
}

impl TrackerOperation {
    pub const fn label(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Deprecate => "deprecate",
            Self::Usage => "usage",
        }
    }
}

#[cfg(feature = "metrics")]
fn observe<T>(operation: TrackerOperation, result: &Result<T, ApiError>) {
    crate::metrics::record_outcome(operation, result);
}

#[cfg(not(feature = "metrics"))]
fn observe<T>(_operation: TrackerOperation, _result: &Result<T, ApiError>) {}
