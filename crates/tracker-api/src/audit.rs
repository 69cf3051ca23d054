//! Audit logging
//!
//! Audit entries are written through the storage client into the `log` table
//! as `(code, level, log)`. Callers treat emission as best effort.

use asset_tracker_core::{Result, TrackerError, LOG_TABLE};
use asset_tracker_storage::{DynStorageClient, InsertPayload, RESPONSE_INSERTED};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Audit code recorded when a tracking record is deprecated.
pub const ASSET_DEPRECATED_CODE: &str = "ASTDP";

/// Severity stored in the `level` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditSeverity {
    Success,
    Failure,
    Warning,
    Information,
}

impl AuditSeverity {
    pub const fn level(self) -> i64 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Warning => 2,
            Self::Information => 4,
        }
    }
}

/// Sink for audit entries
pub trait AuditLogger: Send + Sync {
    fn emit<'a>(
        &'a self,
        code: &'a str,
        severity: AuditSeverity,
        details: Value,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    fn information<'a>(
        &'a self,
        code: &'a str,
        details: Value,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        self.emit(code, AuditSeverity::Information, details)
    }
}

/// Audit logger writing to the `log` table via a storage client.
#[derive(Clone)]
pub struct StorageAuditLogger {
    storage: Arc<DynStorageClient>,
}

impl StorageAuditLogger {
    pub fn new(storage: Arc<DynStorageClient>) -> Self {
        Self { storage }
    }
}

impl AuditLogger for StorageAuditLogger {
    fn emit<'a>(
        &'a self,
        code: &'a str,
        severity: AuditSeverity,
        details: Value,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let payload = InsertPayload::new()
                .value("code", code)
                .value("level", severity.level())
                .value("log", details);

            let response = self.storage.insert(LOG_TABLE, &payload).await?;
            if response.response.as_deref() == Some(RESPONSE_INSERTED) {
                Ok(())
            } else {
                Err(TrackerError::Storage(response.message.unwrap_or_else(|| {
                    format!("Failed to write audit entry {}", code)
                })))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset_tracker_storage::{QueryPayload, SqliteStorage, StorageClient};
    use serde_json::json;

    #[test]
    fn severity_levels() {
        assert_eq!(AuditSeverity::Success.level(), 0);
        assert_eq!(AuditSeverity::Failure.level(), 1);
        assert_eq!(AuditSeverity::Warning.level(), 2);
        assert_eq!(AuditSeverity::Information.level(), 4);
    }

    #[tokio::test]
    async fn storage_logger_writes_log_row() {
        let storage = Arc::new(SqliteStorage::in_memory().unwrap());
        let logger = StorageAuditLogger::new(storage.clone());

        logger
            .information(ASSET_DEPRECATED_CODE, json!({"asset": "sinusoid"}))
            .await
            .unwrap();

        let rows = storage
            .query(LOG_TABLE, &QueryPayload::select(["code", "level", "log"]))
            .await
            .unwrap()
            .into_rows()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["code"], json!("ASTDP"));
        assert_eq!(rows[0]["level"], json!(4));
        assert_eq!(rows[0]["log"], json!({"asset": "sinusoid"}));
    }
}
