//! Error responses for HTTP handlers

use axum::{Json, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::validate::FieldError;

/// JSON body returned for every failed request
///
/// ```json
/// {
///   "error": "job '7' not found",
///   "error_code": "JOB_NOT_FOUND"
/// }
/// ```
///
/// Validation failures also carry `details`, one entry per failing field.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(skip)]
    pub status_code: StatusCode,

    /// Human-readable message
    pub error: String,

    /// Stable SCREAMING_SNAKE_CASE code
    pub error_code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

/// Implemented by the per-handler error enums
pub trait IntoErrorResponse: std::fmt::Display + Send + Sync + 'static {
    fn error_code(&self) -> &'static str;

    fn status_code(&self) -> StatusCode;

    fn details(&self) -> Option<Vec<FieldError>> {
        None
    }
}

impl<E> From<E> for ErrorResponse
where
    E: IntoErrorResponse,
{
    fn from(error: E) -> Self {
        ErrorResponse {
            status_code: error.status_code(),
            error: error.to_string(),
            error_code: error.error_code().to_string(),
            details: error.details(),
        }
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

impl axum::response::IntoResponse for ErrorResponse {
    fn into_response(self) -> axum::response::Response {
        (self.status_code, Json(self)).into_response()
    }
}
