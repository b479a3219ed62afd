//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use shaper_core::ShaperError;

/// Errors surfaced to HTTP clients. Validation and apply failures are the
/// client's to fix (400); anything else is a 500.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl From<ShaperError> for ApiError {
    fn from(err: ShaperError) -> Self {
        match err {
            ShaperError::Validation(message) => Self::BadRequest(message),
            execution @ ShaperError::Execution { .. } => {
                Self::BadRequest(format!("Failed to apply configuration: {execution}"))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            Self::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
