//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use metagov_core::error::GovError;
use serde_json::json;

/// Any handler failure. Renders `{success: false, error, status}`.
#[derive(Debug)]
pub struct AppError(pub GovError);

impl From<GovError> for AppError {
    fn from(e: GovError) -> Self {
        Self(e)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self(GovError::Internal(e.into()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }
        let body = Json(json!({
            "success": false,
            "error": self.0.to_string(),
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}
