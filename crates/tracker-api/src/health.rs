//! Health Check Module
//!
//! Probe endpoints for process supervisors and load balancers:
//! - `/health` - Basic health check (returns "ok")
//! - `/ready` - Readiness probe (pings the storage backend)
//! - `/live` - Liveness probe (always healthy while the process runs)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::time::Instant;

use crate::AppState;

/// Health check response with detailed status
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Basic health check - always returns "ok" if the server is running
pub async fn health_check() -> &'static str {
    "ok"
}

/// Liveness probe
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: HealthStatus::Healthy,
            storage: None,
            message: Some("Service is alive".to_string()),
        }),
    )
}

/// Readiness probe - 503 while the storage backend cannot be reached
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let storage_health = match check_storage_health(&state).await {
        Ok(latency_ms) => ComponentHealth {
            status: HealthStatus::Healthy,
            latency_ms: Some(latency_ms),
            message: None,
        },
        Err(e) => ComponentHealth {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(e),
        },
    };

    let overall_status = storage_health.status;
    let status_code = match overall_status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    tracing::debug!(status = ?overall_status, "Readiness check completed");

    (
        status_code,
        Json(HealthResponse {
            status: overall_status,
            storage: Some(storage_health),
            message: Some(
                if overall_status == HealthStatus::Healthy {
                    "Service is ready"
                } else {
                    "Service is not ready"
                }
                .to_string(),
            ),
        }),
    )
}

async fn check_storage_health(state: &AppState) -> Result<u64, String> {
    let start = Instant::now();
    state
        .storage
        .ping()
        .await
        .map_err(|e| format!("Storage ping failed: {}", e))?;
    Ok(start.elapsed().as_millis() as u64)
}
