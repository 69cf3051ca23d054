//! Shared fixtures for router tests.

#![allow(dead_code)]

use asset_tracker_api::{build_router, AppState, AuditLogger, AuditSeverity};
use asset_tracker_core::{Result, TrackerError, ASSET_TRACKER_TABLE};
use asset_tracker_storage::{
    InsertPayload, QueryPayload, QueryResponse, SqliteStorage, StorageClient, UpdatePayload,
    WriteResponse,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tower::ServiceExt;

/// Helper to make HTTP requests to the test app
pub async fn make_request(app: Router, method: &str, path: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(path)
        .method(method)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = serde_json::from_slice(&body_bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).to_string()));

    (status, json)
}

pub fn sqlite_app() -> (Router, Arc<SqliteStorage>) {
    let storage = Arc::new(SqliteStorage::in_memory().unwrap());
    let app = build_router(AppState::from_storage(storage.clone()));
    (app, storage)
}

pub async fn seed_record(
    storage: &SqliteStorage,
    service: &str,
    asset: &str,
    event: &str,
    datapoints: &[&str],
) {
    let payload = InsertPayload::new()
        .value("service", service)
        .value("asset", asset)
        .value("event", event)
        .value("plugin", "sinusoid")
        .value("fledge", "Fledge")
        .value("ts", "2024-03-01 12:30:45.123456")
        .value("data", json!({ "datapoints": datapoints }));
    let response = storage.insert(ASSET_TRACKER_TABLE, &payload).await.unwrap();
    assert_eq!(response, WriteResponse::inserted(1));
}

/// Audit sink that always fails.
pub struct FailingAuditLogger;

impl AuditLogger for FailingAuditLogger {
    fn emit<'a>(
        &'a self,
        _code: &'a str,
        _severity: AuditSeverity,
        _details: Value,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async { Err(TrackerError::Storage("audit sink unavailable".into())) })
    }
}

/// Storage returning scripted responses and recording the payloads it saw.
#[derive(Default)]
pub struct ScriptedStorage {
    pub query_responses: Mutex<Vec<QueryResponse>>,
    pub update_responses: Mutex<Vec<WriteResponse>>,
    pub queries: Mutex<Vec<QueryPayload>>,
    pub updates: Mutex<Vec<UpdatePayload>>,
}

impl ScriptedStorage {
    pub fn with_queries(responses: Vec<QueryResponse>) -> Self {
        Self {
            query_responses: Mutex::new(responses),
            ..Default::default()
        }
    }

    pub fn then_updates(self, responses: Vec<WriteResponse>) -> Self {
        *self.update_responses.lock() = responses;
        self
    }
}

impl StorageClient for ScriptedStorage {
    fn query<'a>(
        &'a self,
        _table: &'a str,
        payload: &'a QueryPayload,
    ) -> Pin<Box<dyn Future<Output = Result<QueryResponse>> + Send + 'a>> {
        Box::pin(async move {
            self.queries.lock().push(payload.clone());
            let mut responses = self.query_responses.lock();
            if responses.is_empty() {
                return Err(TrackerError::Other("no scripted query response".into()));
            }
            Ok(responses.remove(0))
        })
    }

    fn update<'a>(
        &'a self,
        _table: &'a str,
        payload: &'a UpdatePayload,
    ) -> Pin<Box<dyn Future<Output = Result<WriteResponse>> + Send + 'a>> {
        Box::pin(async move {
            self.updates.lock().push(payload.clone());
            let mut responses = self.update_responses.lock();
            if responses.is_empty() {
                return Err(TrackerError::Other("no scripted update response".into()));
            }
            Ok(responses.remove(0))
        })
    }

    fn insert<'a>(
        &'a self,
        _table: &'a str,
        _payload: &'a InsertPayload,
    ) -> Pin<Box<dyn Future<Output = Result<WriteResponse>> + Send + 'a>> {
        Box::pin(async { Ok(WriteResponse::inserted(1)) })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Err(TrackerError::Other("scripted storage is offline".into())) })
    }
}

pub fn scripted_app(storage: Arc<ScriptedStorage>) -> Router {
    build_router(AppState::new(storage, Arc::new(FailingAuditLogger)))
}
