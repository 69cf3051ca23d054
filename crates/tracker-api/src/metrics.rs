//! Prometheus metrics (feature `metrics`)
//!
//! Request metrics are labelled with the matched route template, so the
//! deprecation route reports `/track/service/:service/asset/:asset/event/:event`
//! however many distinct keys are requested. Tracker operations are counted
//! per outcome, where the outcome is `success` or the [`ApiError`] type.

use axum::{
    extract::{MatchedPath, Request},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::time::Instant;

use crate::error::ApiError;
use crate::track::TrackerOperation;

/// Latency buckets in seconds; SQLite round trips sit at the low end.
const LATENCY_BUCKETS: &[f64] = &[0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.1, 0.5, 2.0];

lazy_static! {
    static ref HTTP_REQUESTS: CounterVec = register_counter_vec!(
        "http_requests_total",
        "HTTP requests served, by method, route and status",
        &["method", "path", "status"]
    )
    .unwrap();

    static ref HTTP_LATENCY: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latency in seconds, by method and route",
        &["method", "path"],
        LATENCY_BUCKETS.to_vec()
    )
    .unwrap();

    static ref TRACKER_OPERATIONS: CounterVec = register_counter_vec!(
        "tracker_operations_total",
        "Asset tracker operations, by operation and outcome",
        &["operation", "status"]
    )
    .unwrap();
}

pub fn record_outcome<T>(operation: TrackerOperation, result: &Result<T, ApiError>) {
    let status = match result {
        Ok(_) => "success",
        Err(e) => e.error_type(),
    };
    TRACKER_OPERATIONS
        .with_label_values(&[operation.label(), status])
        .inc();
}

/// Route-level request counter and latency histogram.
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().as_str().to_owned();
    let route = match req.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_owned(),
        None => "unmatched".to_owned(),
    };

    let response = next.run(req).await;

    HTTP_REQUESTS
        .with_label_values(&[&method, &route, response.status().as_str()])
        .inc();
    HTTP_LATENCY
        .with_label_values(&[&method, &route])
        .observe(started.elapsed().as_secs_f64());

    response
}

/// `GET /metrics` in the Prometheus text format
pub async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let mut body = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut body) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }
    ([(header::CONTENT_TYPE, encoder.format_type().to_owned())], body).into_response()
}
