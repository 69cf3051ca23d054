//! Input validation for storage payloads
//!
//! Table and column names are interpolated into SQL, so every name that
//! reaches the storage layer must pass these checks first. Values are always
//! bound as parameters and are not validated here.

use crate::{Result, TrackerError};

/// Maximum length for table and column names
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Validate a table or column name
///
/// Requirements:
/// - Not empty
/// - <= 64 characters
/// - ASCII alphanumeric and underscore only
/// - Cannot start with a digit
pub fn validate_sql_identifier(name: &str, kind: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TrackerError::ValidationError(format!(
            "{} name cannot be empty",
            kind
        )));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(TrackerError::ValidationError(format!(
            "{} name too long: {} > {} characters",
            kind,
            name.len(),
            MAX_IDENTIFIER_LEN
        )));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(TrackerError::ValidationError(format!(
            "{} name '{}' contains invalid characters (allowed: alphanumeric, _)",
            kind, name
        )));
    }

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(TrackerError::ValidationError(format!(
            "{} name '{}' cannot start with a digit",
            kind, name
        )));
    }

    Ok(())
}

/// Validate a filesystem path taken from a `file://` storage URI
pub fn validate_file_uri_path(path: &str) -> Result<()> {
    if path.contains("..") {
        return Err(TrackerError::ValidationError(
            "Path contains traversal pattern (..)".to_string(),
        ));
    }

    if path.contains('\0') {
        return Err(TrackerError::ValidationError(
            "Path contains null byte".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_sql_identifier("asset_tracker", "table").is_ok());
        assert!(validate_sql_identifier("deprecated_ts", "column").is_ok());
        assert!(validate_sql_identifier("ts", "column").is_ok());
        assert!(validate_sql_identifier("deprecatedTimestamp", "alias").is_ok());
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(validate_sql_identifier("", "column").is_err()); // Empty
        assert!(validate_sql_identifier(&"a".repeat(65), "column").is_err()); // Too long
        assert!(validate_sql_identifier("asset; DROP TABLE log", "column").is_err());
        assert!(validate_sql_identifier("asset-name", "column").is_err()); // Hyphen
        assert!(validate_sql_identifier("1column", "column").is_err()); // Leading digit
        assert!(validate_sql_identifier("\"quoted\"", "column").is_err());
    }

    #[test]
    fn test_validate_file_uri_path() {
        assert!(validate_file_uri_path("asset_tracker.db").is_ok());
        assert!(validate_file_uri_path("data/asset_tracker.db").is_ok());
        assert!(validate_file_uri_path("../../../etc/passwd").is_err()); // Traversal
        assert!(validate_file_uri_path("data\0hidden").is_err()); // Null byte
    }
}
