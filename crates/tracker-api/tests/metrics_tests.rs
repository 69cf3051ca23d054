//! Metrics endpoint tests.
//!
//! Run with: `cargo test -p asset-tracker-api --features metrics --test metrics_tests`

#![cfg(feature = "metrics")]

mod common;

use axum::http::StatusCode;
use common::{make_request, seed_record, sqlite_app};

#[tokio::test]
async fn test_metrics_report_operations_and_route_templates() {
    let (app, storage) = sqlite_app();
    seed_record(&storage, "Sine", "sinusoid", "Ingest", &["sinusoid"]).await;

    let (status, _) = make_request(app.clone(), "GET", "/track").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = make_request(
        app.clone(),
        "PUT",
        "/track/service/Sine/asset/sinusoid/event/Ingest",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = make_request(
        app.clone(),
        "PUT",
        "/track/service/Sine/asset/missing/event/Ingest",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = make_request(app, "GET", "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();

    assert!(text.contains(r#"tracker_operations_total{operation="list",status="success"} 1"#));
    assert!(text.contains(r#"tracker_operations_total{operation="deprecate",status="success"} 1"#));
    assert!(text.contains(r#"tracker_operations_total{operation="deprecate",status="not_found"} 1"#));
    assert!(text.contains(
        r#"http_requests_total{method="PUT",path="/track/service/:service/asset/:asset/event/:event",status="200"} 1"#
    ));
    assert!(!text.contains("path=\"/track/service/Sine"));
}
