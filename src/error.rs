//! Crate-wide error taxonomy, mapped to HTTP responses at the boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DepotError {
    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("passwords do not match")]
    Mismatch,

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for DepotError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            // Database and internal detail stays out of response bodies
            Self::Database(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            Self::Mismatch | Self::Validation(_) | Self::InvalidRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<rusqlite::Error> for DepotError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
