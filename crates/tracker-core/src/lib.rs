//! Asset Tracker Core
//!
//! Core types, errors, and the SQLite schema for the asset tracker: an audit
//! table recording which service and plugin last touched a data asset, and
//! when.

use chrono::Local;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub mod datapoints;
pub mod validation;

pub use datapoints::{
    summarize_datapoints, AssetDatapointSummary, DatapointUsage, StoreEvent, StoreEventData,
};

/// Table holding asset tracking records
pub const ASSET_TRACKER_TABLE: &str = "asset_tracker";

/// Table holding audit log entries
pub const LOG_TABLE: &str = "log";

/// Columns whose TEXT contents are JSON documents
pub const JSON_COLUMNS: &[&str] = &["data", "log"];

/// Event name recorded when a service writes readings for an asset
pub const STORE_EVENT: &str = "store";

/// One row of the asset tracker as returned by the listing query.
///
/// `timestamp` arrives already formatted by the storage layer. An unset
/// `deprecatedTimestamp` is represented as an empty string on the wire; SQL
/// NULL is read the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub asset: String,
    pub event: String,
    pub service: String,
    /// Name of the instance that registered the record
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fledge: String,
    pub plugin: String,
    pub timestamp: String,
    #[serde(
        rename = "deprecatedTimestamp",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub deprecated_timestamp: String,
    #[serde(default)]
    pub data: Value,
}

impl TrackingRecord {
    /// Whether the record has already been marked deprecated
    pub fn is_deprecated(&self) -> bool {
        !self.deprecated_timestamp.is_empty()
    }
}

/// Natural key of a tracking record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingKey {
    pub service: String,
    pub asset: String,
    pub event: String,
}

impl TrackingKey {
    pub fn new(
        service: impl Into<String>,
        asset: impl Into<String>,
        event: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            asset: asset.into(),
            event: event.into(),
        }
    }
}

impl std::fmt::Display for TrackingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "service: {} asset: {} event: {}",
            self.service, self.asset, self.event
        )
    }
}

/// Deprecation state of a tracking record looked up by its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    NotFound,
    Active,
    Deprecated,
}

impl TrackingState {
    /// Derive the state from the `deprecated_ts` value of the first matching
    /// row, if any. JSON null and the empty string both mean active.
    pub fn from_deprecated_ts(value: Option<&Value>) -> Self {
        match value {
            None => TrackingState::NotFound,
            Some(Value::Null) => TrackingState::Active,
            Some(Value::String(s)) if s.is_empty() => TrackingState::Active,
            Some(_) => TrackingState::Deprecated,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Current local time in the format stored in timestamp columns,
/// e.g. `2024-03-01 12:30:45.123456+01:00`.
pub fn local_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.6f%:z").to_string()
}

/// Errors that can occur in asset tracker operations
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for asset tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Initialize the SQLite schema
///
/// Creates the tables if they don't exist:
/// - `asset_tracker`: asset tracking records
/// - `log`: audit log entries
pub fn init_sqlite_schema(conn: &rusqlite::Connection) -> Result<()> {
    let ddl = r#"
    CREATE TABLE IF NOT EXISTS asset_tracker (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      asset TEXT NOT NULL,
      event TEXT NOT NULL,
      service TEXT NOT NULL,
      fledge TEXT NOT NULL DEFAULT '',
      plugin TEXT NOT NULL,
      ts TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now', 'localtime')),
      deprecated_ts TEXT,
      data TEXT NOT NULL DEFAULT '{}'
    );

    CREATE INDEX IF NOT EXISTS idx_asset_tracker_key ON asset_tracker(service, asset, event);
    CREATE INDEX IF NOT EXISTS idx_asset_tracker_event ON asset_tracker(event);

    CREATE TABLE IF NOT EXISTS log (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      code TEXT NOT NULL,
      level INTEGER NOT NULL,
      log TEXT NOT NULL DEFAULT '{}',
      ts TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now', 'localtime'))
    );

    CREATE INDEX IF NOT EXISTS idx_log_code ON log(code);
    "#;

    conn.execute_batch(ddl)?;
    Ok(())
}
