//! Request handlers and the shared `ApiError` envelope (spec.md §7).

pub mod admin;
pub mod cwl;
pub mod health;
pub mod metrics;
pub mod workflows;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde_json::json;
use wf_core::Error;

/// Wraps a domain [`wf_core::Error`] for `IntoResponse`, matching the
/// `{"error":{"code","message"}}` envelope spec.md §7 specifies.
pub struct ApiError(Error);

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(Error::Validation {
            message: message.into(),
            field: None,
        })
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, code = self.0.error_code(), "request failed");
        } else {
            tracing::debug!(error = %self.0, code = self.0.error_code(), "request rejected");
        }
        let body = json!({
            "error": {
                "code": self.0.error_code(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
