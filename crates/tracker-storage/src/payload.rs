//! Query, update, and insert payloads understood by a [`StorageClient`].
//!
//! Payloads describe a request against one table: projected columns with
//! optional aliases and formatting, `DISTINCT`, and a chain of predicates
//! that are always combined with `AND`. Column and alias names are validated
//! before they are rendered into SQL; values are bound as parameters.
//!
//! [`StorageClient`]: crate::StorageClient

use asset_tracker_core::validation::validate_sql_identifier;
use asset_tracker_core::{Result, TrackerError, JSON_COLUMNS};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// Output formatting applied to a projected column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFormat {
    /// `YYYY-MM-DD HH:MM:SS.mmm`
    TimestampMillis,
}

impl ColumnFormat {
    fn render(&self, column: &str) -> String {
        match self {
            ColumnFormat::TimestampMillis => format!("strftime('%Y-%m-%d %H:%M:%f', {})", column),
        }
    }
}

/// A projected column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub alias: Option<String>,
    pub format: Option<ColumnFormat>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            format: None,
        }
    }

    /// Name of the column in result rows
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    fn render(&self) -> Result<String> {
        validate_sql_identifier(&self.name, "Column")?;
        let expr = match self.format {
            Some(format) => format.render(&self.name),
            None => self.name.clone(),
        };
        match (&self.alias, self.format) {
            (Some(alias), _) => {
                validate_sql_identifier(alias, "Alias")?;
                Ok(format!("{} AS \"{}\"", expr, alias))
            }
            (None, Some(_)) => Ok(format!("{} AS \"{}\"", expr, self.name)),
            (None, None) => Ok(expr),
        }
    }
}

/// A single predicate in a payload's `WHERE` chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Always true (`1 = 1`)
    Always,
    /// `column = value`
    Eq { column: String, value: Value },
    /// `column IS NULL`
    IsNull { column: String },
    /// `column IS NULL OR column = ''`
    IsNullOrEmpty { column: String },
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Condition::IsNull {
            column: column.into(),
        }
    }

    /// Matches a text column holding neither a value nor an empty string.
    pub fn is_null_or_empty(column: impl Into<String>) -> Self {
        Condition::IsNullOrEmpty {
            column: column.into(),
        }
    }
}

/// A SELECT against a single table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPayload {
    columns: Vec<Column>,
    distinct: bool,
    conditions: Vec<Condition>,
}

impl QueryPayload {
    /// Select the given columns. An empty list selects every column.
    pub fn select<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Column::new).collect(),
            ..Default::default()
        }
    }

    /// Select the distinct combinations of the given columns.
    pub fn distinct<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            distinct: true,
            ..Self::select(columns)
        }
    }

    /// Rename a selected column in the result rows.
    pub fn alias(mut self, column: &str, alias: impl Into<String>) -> Self {
        if let Some(c) = self.columns.iter_mut().find(|c| c.name == column) {
            c.alias = Some(alias.into());
        }
        self
    }

    /// Apply output formatting to a selected column.
    pub fn format(mut self, column: &str, format: ColumnFormat) -> Self {
        if let Some(c) = self.columns.iter_mut().find(|c| c.name == column) {
            c.format = Some(format);
        }
        self
    }

    /// Start the predicate chain. Equivalent to [`and_where`](Self::and_where).
    pub fn where_(self, condition: Condition) -> Self {
        self.and_where(condition)
    }

    /// Add a predicate, combined with the existing ones using `AND`.
    pub fn and_where(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Render the payload into a parameterised SQL statement.
    pub fn to_sql(&self, table: &str) -> Result<SqlStatement> {
        validate_sql_identifier(table, "Table")?;

        if self.distinct && self.columns.is_empty() {
            return Err(TrackerError::ValidationError(
                "DISTINCT requires at least one column".to_string(),
            ));
        }

        let projection = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(Column::render)
                .collect::<Result<Vec<_>>>()?
                .join(", ")
        };

        let mut sql = format!(
            "SELECT {}{} FROM {}",
            if self.distinct { "DISTINCT " } else { "" },
            projection,
            table
        );
        let mut params = Vec::new();
        push_where(&mut sql, &mut params, &self.conditions)?;

        let json_columns = self
            .columns
            .iter()
            .map(|c| c.format.is_none() && JSON_COLUMNS.contains(&c.name.as_str()))
            .collect();

        Ok(SqlStatement {
            sql,
            params,
            json_columns,
        })
    }
}

/// An UPDATE against a single table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePayload {
    values: Vec<(String, Value)>,
    conditions: Vec<Condition>,
}

impl UpdatePayload {
    /// Start an update that assigns `value` to `column`.
    pub fn set(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and_set(column, value)
    }

    /// Assign another column.
    pub fn and_set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }

    pub fn where_(self, condition: Condition) -> Self {
        self.and_where(condition)
    }

    pub fn and_where(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn to_sql(&self, table: &str) -> Result<SqlStatement> {
        validate_sql_identifier(table, "Table")?;

        if self.values.is_empty() {
            return Err(TrackerError::ValidationError(
                "Update must assign at least one column".to_string(),
            ));
        }

        let mut params = Vec::with_capacity(self.values.len());
        let mut assignments = Vec::with_capacity(self.values.len());
        for (column, value) in &self.values {
            validate_sql_identifier(column, "Column")?;
            params.push(to_sql_value(value));
            assignments.push(format!("{} = ?{}", column, params.len()));
        }

        let mut sql = format!("UPDATE {} SET {}", table, assignments.join(", "));
        push_where(&mut sql, &mut params, &self.conditions)?;

        Ok(SqlStatement {
            sql,
            params,
            json_columns: Vec::new(),
        })
    }
}

/// An INSERT of one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertPayload {
    values: Vec<(String, Value)>,
}

impl InsertPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value. Objects and arrays are stored as JSON text.
    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }

    pub fn to_sql(&self, table: &str) -> Result<SqlStatement> {
        validate_sql_identifier(table, "Table")?;

        if self.values.is_empty() {
            return Err(TrackerError::ValidationError(
                "Insert must provide at least one column".to_string(),
            ));
        }

        let mut columns = Vec::with_capacity(self.values.len());
        let mut placeholders = Vec::with_capacity(self.values.len());
        let mut params = Vec::with_capacity(self.values.len());
        for (column, value) in &self.values {
            validate_sql_identifier(column, "Column")?;
            columns.push(column.as_str());
            params.push(to_sql_value(value));
            placeholders.push(format!("?{}", params.len()));
        }

        Ok(SqlStatement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders.join(", ")
            ),
            params,
            json_columns: Vec::new(),
        })
    }
}

/// A rendered statement ready to run against SQLite.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
    /// Per projected column, whether its text holds a JSON document.
    /// Empty for `SELECT *`, in which case column names decide.
    pub json_columns: Vec<bool>,
}

fn push_where(sql: &mut String, params: &mut Vec<SqlValue>, conditions: &[Condition]) -> Result<()> {
    if conditions.is_empty() {
        return Ok(());
    }

    let mut clauses = Vec::with_capacity(conditions.len());
    for condition in conditions {
        let clause = match condition {
            Condition::Always => "1 = 1".to_string(),
            Condition::Eq { column, value } => {
                validate_sql_identifier(column, "Column")?;
                params.push(to_sql_value(value));
                format!("{} = ?{}", column, params.len())
            }
            Condition::IsNull { column } => {
                validate_sql_identifier(column, "Column")?;
                format!("{} IS NULL", column)
            }
            Condition::IsNullOrEmpty { column } => {
                validate_sql_identifier(column, "Column")?;
                format!("({0} IS NULL OR {0} = '')", column)
            }
        };
        clauses.push(clause);
    }

    sql.push_str(" WHERE ");
    sql.push_str(&clauses.join(" AND "));
    Ok(())
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .unwrap_or(SqlValue::Null),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}
