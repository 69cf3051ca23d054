//! Asset Tracker Storage
//!
//! Storage client abstraction for the asset tracker, with a SQLite backend.
//!
//! The client mirrors a storage service that answers with JSON documents:
//! failures the backend can describe (bad SQL, constraint violations, invalid
//! payloads) come back as a response carrying only a `message`, while
//! failures to reach the backend at all surface as `Err`.

use asset_tracker_core::{init_sqlite_schema, Result, TrackerError, JSON_COLUMNS};
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

pub mod payload;

pub use payload::{
    Column, ColumnFormat, Condition, InsertPayload, QueryPayload, SqlStatement, UpdatePayload,
};

/// Convenience alias for trait objects.
pub type DynStorageClient = dyn StorageClient;

/// One result row, keyed by output column name.
pub type Row = Map<String, Value>;

/// How long a statement waits on a locked database file before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `response` value reported by a successful update.
pub const RESPONSE_UPDATED: &str = "updated";

/// `response` value reported by a successful insert.
pub const RESPONSE_INSERTED: &str = "inserted";

/// Result document of a query.
///
/// A successful query carries `rows` (and `count`); a storage-reported failure
/// carries only `message`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Row>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl QueryResponse {
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            count: Some(rows.len()),
            rows: Some(rows),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            rows: None,
            count: None,
            message: Some(message.into()),
        }
    }

    /// Take the rows, or the storage-supplied failure message when the
    /// response carries none.
    pub fn into_rows(self) -> std::result::Result<Vec<Row>, String> {
        match self.rows {
            Some(rows) => Ok(rows),
            None => Err(self
                .message
                .unwrap_or_else(|| "Storage returned no rows".to_string())),
        }
    }
}

/// Result document of an update or insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WriteResponse {
    pub fn updated(rows_affected: u64) -> Self {
        Self {
            response: Some(RESPONSE_UPDATED.to_string()),
            rows_affected: Some(rows_affected),
            message: None,
        }
    }

    pub fn inserted(rows_affected: u64) -> Self {
        Self {
            response: Some(RESPONSE_INSERTED.to_string()),
            rows_affected: Some(rows_affected),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            response: None,
            rows_affected: None,
            message: Some(message.into()),
        }
    }
}

/// Storage client used by the asset tracker (async)
///
/// # Manual Async Trait
///
/// Methods return `Pin<Box<dyn Future>>` rather than using the async-trait
/// crate so the trait stays object safe with explicit `Send` bounds.
pub trait StorageClient: Send + Sync {
    /// Run a query against `table`.
    fn query<'a>(
        &'a self,
        table: &'a str,
        payload: &'a QueryPayload,
    ) -> Pin<Box<dyn Future<Output = Result<QueryResponse>> + Send + 'a>>;

    /// Run an update against `table`.
    fn update<'a>(
        &'a self,
        table: &'a str,
        payload: &'a UpdatePayload,
    ) -> Pin<Box<dyn Future<Output = Result<WriteResponse>> + Send + 'a>>;

    /// Insert one row into `table`.
    fn insert<'a>(
        &'a self,
        table: &'a str,
        payload: &'a InsertPayload,
    ) -> Pin<Box<dyn Future<Output = Result<WriteResponse>> + Send + 'a>>;

    /// Check that the backend is reachable.
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Parsed representation of a storage URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    Memory,
    Local(PathBuf),
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageLocation::Memory => write!(f, "sqlite::memory:"),
            StorageLocation::Local(path) => write!(f, "file://{}", path.display()),
        }
    }
}

/// Parse a storage URI into a structured location.
///
/// Accepts `sqlite::memory:` (or `:memory:`), `file://<path>`, or a raw path.
pub fn parse_storage_uri(uri: &str) -> Result<StorageLocation> {
    if uri == ":memory:" || uri == "sqlite::memory:" {
        return Ok(StorageLocation::Memory);
    }

    if let Some(path) = uri.strip_prefix("file://") {
        asset_tracker_core::validation::validate_file_uri_path(path)?;
        return Ok(StorageLocation::Local(PathBuf::from(path)));
    }

    if uri.is_empty() {
        return Err(TrackerError::ValidationError(
            "Storage URI cannot be empty".to_string(),
        ));
    }

    Ok(StorageLocation::Local(PathBuf::from(uri)))
}

/// Open a SQLite storage client from a URI.
pub fn storage_from_uri(uri: &str) -> Result<SqliteStorage> {
    match parse_storage_uri(uri)? {
        StorageLocation::Memory => SqliteStorage::in_memory(),
        StorageLocation::Local(path) => SqliteStorage::open(path),
    }
}

/// SQLite storage client
///
/// Holds one connection shared by every request. SQLite work runs on the
/// blocking thread pool; the connection is never held across an `.await`.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    location: StorageLocation,
}

impl fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("location", &self.location)
            .finish()
    }
}

impl SqliteStorage {
    /// Open (or create) a database file and initialize the schema.
    ///
    /// # Example
    /// ```no_run
    /// use asset_tracker_storage::SqliteStorage;
    ///
    /// let storage = SqliteStorage::open("asset_tracker.db").unwrap();
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        Self::from_connection(conn, StorageLocation::Local(path))
    }

    /// Create a private in-memory database with the schema initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, StorageLocation::Memory)
    }

    fn from_connection(conn: Connection, location: StorageLocation) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        init_sqlite_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location,
        })
    }

    pub fn location(&self) -> &StorageLocation {
        &self.location
    }

    async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> T + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| TrackerError::Other(format!("Task join error: {}", e)))
    }
}

impl StorageClient for SqliteStorage {
    fn query<'a>(
        &'a self,
        table: &'a str,
        payload: &'a QueryPayload,
    ) -> Pin<Box<dyn Future<Output = Result<QueryResponse>> + Send + 'a>> {
        let statement = payload.to_sql(table);
        Box::pin(async move {
            let statement = match statement {
                Ok(statement) => statement,
                Err(e) => {
                    tracing::warn!(table, error = %e, "Rejected query payload");
                    return Ok(QueryResponse::failed(e.to_string()));
                }
            };
            tracing::debug!(table, sql = %statement.sql, "Running query");

            self.with_connection(move |conn| match run_query(conn, &statement) {
                Ok(rows) => QueryResponse::with_rows(rows),
                Err(e) => {
                    tracing::warn!(sql = %statement.sql, error = %e, "Query failed");
                    QueryResponse::failed(e.to_string())
                }
            })
            .await
        })
    }

    fn update<'a>(
        &'a self,
        table: &'a str,
        payload: &'a UpdatePayload,
    ) -> Pin<Box<dyn Future<Output = Result<WriteResponse>> + Send + 'a>> {
        let statement = payload.to_sql(table);
        Box::pin(async move {
            let statement = match statement {
                Ok(statement) => statement,
                Err(e) => return Ok(WriteResponse::failed(e.to_string())),
            };
            tracing::debug!(table, sql = %statement.sql, "Running update");

            self.with_connection(move |conn| match run_write(conn, &statement) {
                Ok(n) => WriteResponse::updated(n),
                Err(e) => {
                    tracing::warn!(sql = %statement.sql, error = %e, "Update failed");
                    WriteResponse::failed(e.to_string())
                }
            })
            .await
        })
    }

    fn insert<'a>(
        &'a self,
        table: &'a str,
        payload: &'a InsertPayload,
    ) -> Pin<Box<dyn Future<Output = Result<WriteResponse>> + Send + 'a>> {
        let statement = payload.to_sql(table);
        Box::pin(async move {
            let statement = match statement {
                Ok(statement) => statement,
                Err(e) => return Ok(WriteResponse::failed(e.to_string())),
            };
            tracing::debug!(table, sql = %statement.sql, "Running insert");

            self.with_connection(move |conn| match run_write(conn, &statement) {
                Ok(n) => WriteResponse::inserted(n),
                Err(e) => {
                    tracing::warn!(sql = %statement.sql, error = %e, "Insert failed");
                    WriteResponse::failed(e.to_string())
                }
            })
            .await
        })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.with_connection(|conn| conn.query_row("SELECT 1", [], |_| Ok(())))
                .await??;
            Ok(())
        })
    }
}

fn run_query(conn: &Connection, statement: &SqlStatement) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = conn.prepare(&statement.sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let json_columns: Vec<bool> = names
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            statement
                .json_columns
                .get(idx)
                .copied()
                .unwrap_or_else(|| JSON_COLUMNS.contains(&name.as_str()))
        })
        .collect();

    let rows = stmt
        .query_map(params_from_iter(statement.params.iter()), |row| {
            let mut map = Map::with_capacity(names.len());
            for (idx, name) in names.iter().enumerate() {
                map.insert(name.clone(), to_json(row.get_ref(idx)?, json_columns[idx]));
            }
            Ok(map)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

fn run_write(conn: &Connection, statement: &SqlStatement) -> rusqlite::Result<u64> {
    let affected = conn.execute(&statement.sql, params_from_iter(statement.params.iter()))?;
    Ok(affected as u64)
}

fn to_json(value: ValueRef<'_>, json_column: bool) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            if json_column {
                if let Ok(parsed) = serde_json::from_str(&text) {
                    return parsed;
                }
            }
            Value::String(text.into_owned())
        }
        ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset_tracker_core::ASSET_TRACKER_TABLE;
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn seed(storage: &SqliteStorage, asset: &str, event: &str, data: Value) {
        let conn = storage.conn.lock();
        conn.execute(
            "INSERT INTO asset_tracker (asset, event, service, plugin, ts, data) VALUES (?1, ?2, 'south', 'sinusoid', '2024-03-01 12:30:45.123456', ?3)",
            rusqlite::params![asset, event, data.to_string()],
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_query_formats_and_parses_columns() {
        let storage = SqliteStorage::in_memory().unwrap();
        seed(&storage, "sinusoid", "Ingest", json!({"datapoints": ["sinusoid"]}));

        let payload = QueryPayload::select(["asset", "ts", "deprecated_ts", "data"])
            .alias("ts", "timestamp")
            .format("ts", ColumnFormat::TimestampMillis)
            .alias("deprecated_ts", "deprecatedTimestamp")
            .where_(Condition::Always);
        let response = storage.query(ASSET_TRACKER_TABLE, &payload).await.unwrap();

        let rows = response.rows.unwrap();
        assert_eq!(response.count, Some(1));
        assert_eq!(rows[0]["asset"], json!("sinusoid"));
        assert_eq!(rows[0]["timestamp"], json!("2024-03-01 12:30:45.123"));
        assert_eq!(rows[0]["deprecatedTimestamp"], Value::Null);
        assert_eq!(rows[0]["data"], json!({"datapoints": ["sinusoid"]}));
    }

    #[tokio::test]
    async fn test_query_equality_filters() {
        let storage = SqliteStorage::in_memory().unwrap();
        seed(&storage, "sinusoid", "Ingest", json!({}));
        seed(&storage, "motor", "Ingest", json!({}));
        seed(&storage, "motor", "store", json!({}));

        let payload = QueryPayload::select(["asset", "event"])
            .where_(Condition::Always)
            .and_where(Condition::eq("asset", "motor"))
            .and_where(Condition::eq("event", "Ingest"));
        let rows = storage
            .query(ASSET_TRACKER_TABLE, &payload)
            .await
            .unwrap()
            .rows
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["asset"], json!("motor"));
    }

    #[tokio::test]
    async fn test_distinct_query() {
        let storage = SqliteStorage::in_memory().unwrap();
        seed(&storage, "motor", "store", json!({"datapoints": ["rpm"]}));
        seed(&storage, "motor", "store", json!({"datapoints": ["rpm"]}));
        seed(&storage, "motor", "store", json!({"datapoints": ["rpm", "current"]}));

        let payload =
            QueryPayload::distinct(["asset", "data"]).where_(Condition::eq("event", "store"));
        let rows = storage
            .query(ASSET_TRACKER_TABLE, &payload)
            .await
            .unwrap()
            .rows
            .unwrap();

        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_query_failure_is_reported_in_body() {
        let storage = SqliteStorage::in_memory().unwrap();

        let payload = QueryPayload::select(["no_such_column"]);
        let response = storage.query(ASSET_TRACKER_TABLE, &payload).await.unwrap();
        assert!(response.rows.is_none());
        assert!(response.into_rows().unwrap_err().contains("no_such_column"));

        let invalid = QueryPayload::select(["bad column"]);
        let response = storage.query(ASSET_TRACKER_TABLE, &invalid).await.unwrap();
        assert!(response.rows.is_none());
        assert!(response.message.is_some());
    }

    #[tokio::test]
    async fn test_update_honours_null_guard() {
        let storage = SqliteStorage::in_memory().unwrap();
        seed(&storage, "sinusoid", "Ingest", json!({}));

        let payload = UpdatePayload::set("deprecated_ts", "2024-03-02 08:00:00.000000+00:00")
            .where_(Condition::eq("asset", "sinusoid"))
            .and_where(Condition::is_null("deprecated_ts"));

        let first = storage.update(ASSET_TRACKER_TABLE, &payload).await.unwrap();
        assert_eq!(first, WriteResponse::updated(1));

        let second = storage.update(ASSET_TRACKER_TABLE, &payload).await.unwrap();
        assert_eq!(second, WriteResponse::updated(0));
    }

    #[tokio::test]
    async fn test_update_null_or_empty_guard_matches_empty_text() {
        let storage = SqliteStorage::in_memory().unwrap();
        seed(&storage, "sinusoid", "Ingest", json!({}));
        storage
            .conn
            .lock()
            .execute("UPDATE asset_tracker SET deprecated_ts = ''", [])
            .unwrap();

        let payload = UpdatePayload::set("deprecated_ts", "2024-03-02 08:00:00.000000+00:00")
            .where_(Condition::eq("asset", "sinusoid"))
            .and_where(Condition::is_null_or_empty("deprecated_ts"));

        let first = storage.update(ASSET_TRACKER_TABLE, &payload).await.unwrap();
        assert_eq!(first, WriteResponse::updated(1));

        let second = storage.update(ASSET_TRACKER_TABLE, &payload).await.unwrap();
        assert_eq!(second, WriteResponse::updated(0));
    }

    #[tokio::test]
    async fn test_insert_json_column() {
        let storage = SqliteStorage::in_memory().unwrap();

        let payload = InsertPayload::new()
            .value("code", "ASTDP")
            .value("level", 4)
            .value("log", json!({"asset": "sinusoid"}));
        let response = storage.insert("log", &payload).await.unwrap();
        assert_eq!(response, WriteResponse::inserted(1));

        let rows = storage
            .query("log", &QueryPayload::select(["code", "log"]))
            .await
            .unwrap()
            .rows
            .unwrap();
        assert_eq!(rows[0]["log"], json!({"asset": "sinusoid"}));
    }

    #[tokio::test]
    async fn test_file_storage_persists() {
        let temp_file = NamedTempFile::new().unwrap();
        let storage = SqliteStorage::open(temp_file.path()).unwrap();
        assert_eq!(
            storage.location(),
            &StorageLocation::Local(temp_file.path().to_path_buf())
        );
        seed(&storage, "sinusoid", "Ingest", json!({}));
        storage.ping().await.unwrap();
        drop(storage);

        let reopened = SqliteStorage::open(temp_file.path()).unwrap();
        let rows = reopened
            .query(ASSET_TRACKER_TABLE, &QueryPayload::select(["asset"]))
            .await
            .unwrap()
            .rows
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_parse_storage_uri() {
        assert_eq!(
            parse_storage_uri("sqlite::memory:").unwrap(),
            StorageLocation::Memory
        );
        assert_eq!(parse_storage_uri(":memory:").unwrap(), StorageLocation::Memory);
        assert_eq!(
            parse_storage_uri("/var/lib/tracker.db").unwrap(),
            StorageLocation::Local(PathBuf::from("/var/lib/tracker.db"))
        );
        assert_eq!(
            parse_storage_uri("file://data/tracker.db").unwrap(),
            StorageLocation::Local(PathBuf::from("data/tracker.db"))
        );
        assert!(parse_storage_uri("file://../etc/passwd").is_err());
        assert!(parse_storage_uri("").is_err());
    }

    #[test]
    fn test_storage_location_display() {
        assert_eq!(StorageLocation::Memory.to_string(), "sqlite::memory:");
        assert_eq!(
            StorageLocation::Local(PathBuf::from("/tmp/t.db")).to_string(),
            "file:///tmp/t.db"
        );
    }
}
