//! Asset tracker operations
//!
//! `TrackerService` owns the storage and audit collaborators and implements
//! the three operations exposed over HTTP: the filtered listing, the
//! one-way deprecation of a record, and the datapoint usage summary. Each
//! request makes at most two sequential storage round trips.

use asset_tracker_core::{
    local_timestamp, summarize_datapoints, DatapointUsage, StoreEvent, TrackingKey,
    TrackingRecord, TrackingState, ASSET_TRACKER_TABLE, STORE_EVENT,
};
use asset_tracker_storage::{
    ColumnFormat, Condition, DynStorageClient, QueryPayload, UpdatePayload, RESPONSE_UPDATED,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::audit::{AuditLogger, ASSET_DEPRECATED_CODE};
use crate::error::ApiError;

/// Columns returned by the listing query, in output order.
pub const TRACK_COLUMNS: [&str; 8] = [
    "asset",
    "event",
    "service",
    "fledge",
    "plugin",
    "ts",
    "deprecated_ts",
    "data",
];

pub const DEPRECATED_MESSAGE: &str = "Asset record entry has been deprecated.";

pub const ALREADY_DEPRECATED_MESSAGE: &str = "Asset record already deprecated.";

/// Optional equality filters for the listing. Empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TrackFilter {
    pub asset: Option<String>,
    pub event: Option<String>,
    pub service: Option<String>,
}

impl TrackFilter {
    fn present(value: &Option<String>) -> Option<&str> {
        value.as_deref().filter(|v| !v.is_empty())
    }

    /// `(column, value)` pairs for every supplied, non-empty filter.
    pub fn predicates(&self) -> Vec<(&'static str, &str)> {
        [
            ("asset", &self.asset),
            ("event", &self.event),
            ("service", &self.service),
        ]
        .into_iter()
        .filter_map(|(column, value)| Self::present(value).map(|v| (column, v)))
        .collect()
    }
}

/// Listing query: every tracking column, `ts` formatted to milliseconds.
pub fn track_query(filter: &TrackFilter) -> QueryPayload {
    let payload = QueryPayload::select(TRACK_COLUMNS)
        .alias("ts", "timestamp")
        .format("ts", ColumnFormat::TimestampMillis)
        .alias("deprecated_ts", "deprecatedTimestamp")
        .where_(Condition::Always);

    filter
        .predicates()
        .into_iter()
        .fold(payload, |payload, (column, value)| {
            payload.and_where(Condition::eq(column, value))
        })
}

pub fn deprecation_lookup_query(key: &TrackingKey) -> QueryPayload {
    QueryPayload::select(["deprecated_ts"])
        .where_(Condition::eq("service", key.service.as_str()))
        .and_where(Condition::eq("asset", key.asset.as_str()))
        .and_where(Condition::eq("event", key.event.as_str()))
}

/// Conditional write setting `deprecated_ts`, guarded on it still being unset
/// (NULL or empty, the same states the lookup treats as active).
pub fn deprecation_update(key: &TrackingKey, deprecated_ts: &str) -> UpdatePayload {
    UpdatePayload::set("deprecated_ts", deprecated_ts)
        .where_(Condition::eq("service", key.service.as_str()))
        .and_where(Condition::eq("asset", key.asset.as_str()))
        .and_where(Condition::eq("event", key.event.as_str()))
        .and_where(Condition::is_null_or_empty("deprecated_ts"))
}

pub fn store_events_query() -> QueryPayload {
    QueryPayload::distinct(["asset", "data"]).where_(Condition::eq("event", STORE_EVENT))
}

pub struct TrackerService {
    storage: Arc<DynStorageClient>,
    audit: Arc<dyn AuditLogger>,
}

impl TrackerService {
    pub fn new(storage: Arc<DynStorageClient>, audit: Arc<dyn AuditLogger>) -> Self {
        Self { storage, audit }
    }

    /// List tracking records matching the filter.
    pub async fn list_records(&self, filter: &TrackFilter) -> Result<Vec<TrackingRecord>, ApiError> {
        let payload = track_query(filter);
        let rows = self
            .storage
            .query(ASSET_TRACKER_TABLE, &payload)
            .await?
            .into_rows()
            .map_err(ApiError::StorageReported)?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row.into())
                    .map_err(|e| ApiError::Unexpected(format!("Invalid tracking row: {}", e)))
            })
            .collect()
    }

    /// Mark a record deprecated.
    ///
    /// Succeeds only for an existing, active record and only when the guarded
    /// update touches exactly one row.
    pub async fn deprecate(&self, key: &TrackingKey) -> Result<(), ApiError> {
        let lookup = deprecation_lookup_query(key);
        let rows = self
            .storage
            .query(ASSET_TRACKER_TABLE, &lookup)
            .await?
            .into_rows()
            .map_err(ApiError::Storage)?;

        let current = rows.first().and_then(|row| row.get("deprecated_ts"));
        match TrackingState::from_deprecated_ts(current) {
            TrackingState::NotFound => {
                return Err(ApiError::NotFound(format!(
                    "No record found in asset tracker for given {}",
                    key
                )));
            }
            TrackingState::Deprecated => {
                return Err(ApiError::Conflict(ALREADY_DEPRECATED_MESSAGE.to_string()));
            }
            TrackingState::Active => {}
        }

        let update = deprecation_update(key, &local_timestamp());
        let response = self.storage.update(ASSET_TRACKER_TABLE, &update).await?;

        let status = match response.response.as_deref() {
            Some(status) => status,
            None => {
                return Err(ApiError::Storage(response.message.unwrap_or_else(|| {
                    "Update response carried no status".to_string()
                })));
            }
        };
        if status != RESPONSE_UPDATED || response.rows_affected != Some(1) {
            tracing::warn!(
                %key,
                status,
                rows_affected = ?response.rows_affected,
                "Deprecation update did not affect exactly one row"
            );
            return Err(ApiError::UpdateFailed(format!(
                "Update failure in asset tracker for {}",
                key
            )));
        }

        self.record_deprecation_audit(key).await;
        tracing::info!(%key, "Asset tracker record deprecated");
        Ok(())
    }

    async fn record_deprecation_audit(&self, key: &TrackingKey) {
        let details = json!({
            "asset": key.asset,
            "service": key.service,
            "event": key.event,
        });
        if let Err(e) = self.audit.information(ASSET_DEPRECATED_CODE, details).await {
            tracing::warn!(%key, error = %e, "Failed to write deprecation audit entry");
        }
    }

    /// Summarize the datapoints reported by store events.
    pub async fn datapoint_usage(&self) -> Result<DatapointUsage, ApiError> {
        let rows = self
            .storage
            .query(ASSET_TRACKER_TABLE, &store_events_query())
            .await?
            .into_rows()
            .map_err(ApiError::StorageReported)?;

        let events = rows
            .into_iter()
            .map(StoreEvent::from_row)
            .collect::<asset_tracker_core::Result<Vec<_>>>()?;

        Ok(summarize_datapoints(events))
    }
}
