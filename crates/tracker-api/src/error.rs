//! API error types.
//!
//! Every error renders as a JSON body `{"message": "..."}` with the status
//! code of its variant.

use asset_tracker_core::TrackerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// No tracking record matches the requested key
    #[error("{0}")]
    NotFound(String),

    /// The record is not in a state that allows the change
    #[error("{0}")]
    Conflict(String),

    /// The conditional write did not update exactly one row
    #[error("{0}")]
    UpdateFailed(String),

    /// A storage row did not have the expected shape
    #[error("{0}")]
    Validation(String),

    /// Storage answered a read with a failure message instead of rows
    #[error("{0}")]
    StorageReported(String),

    /// Storage answered a write with a malformed or failed response
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Unexpected(String),
}

impl ApiError {
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::UpdateFailed(_) => "update_failed",
            Self::Validation(_) => "validation",
            Self::StorageReported(_) => "storage_reported",
            Self::Storage(_) => "storage",
            Self::Unexpected(_) => "unexpected",
        }
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_)
            | Self::UpdateFailed(_)
            | Self::Validation(_)
            | Self::StorageReported(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) | Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::ValidationError(message) => Self::Validation(message),
            other => Self::Unexpected(other.to_string()),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error_type = self.error_type(), error = %self, "Request failed");
        } else {
            tracing::debug!(error_type = self.error_type(), error = %self, "Request rejected");
        }

        (
            status,
            Json(ErrorResponse {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}
