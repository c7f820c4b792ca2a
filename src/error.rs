use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::lookup::LookupError;

/// Application-wide error types with appropriate HTTP status codes.
///
/// # Lookup Errors
///
/// Every [`LookupError`] is answered with `404 IP not found`. Store failures
/// and timeouts are still distinct variants so they are logged at `error`
/// level and counted under their own metric label.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Status code sent to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Lookup(_) => StatusCode::NOT_FOUND,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body for API endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            AppError::BadRequest(msg) => {
                tracing::debug!(error = %msg, "Rejected invalid request");
                msg.clone()
            }
            AppError::Lookup(LookupError::NotFound) => LookupError::NotFound.to_string(),
            // Store failures are surfaced as not-found; keep the cause in the logs.
            AppError::Lookup(e) => {
                tracing::error!(error = %e, kind = e.kind(), "Lookup failed");
                LookupError::NotFound.to_string()
            }
            // Never expose configuration details to clients
            AppError::Config(_) => {
                tracing::error!(error = %self, "Request failed");
                "Internal server error".to_string()
            }
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_bad_request_message_is_echoed() {
        let (status, body) =
            body_of(AppError::BadRequest("IP address is required".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({"error": "IP address is required"}));
    }

    #[tokio::test]
    async fn test_not_found() {
        let (status, body) = body_of(LookupError::NotFound.into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({"error": "IP not found"}));
    }

    #[tokio::test]
    async fn test_store_failures_surface_as_not_found() {
        for err in [
            LookupError::Unavailable("connection refused".to_string()),
            LookupError::Timeout(Duration::from_secs(2)),
        ] {
            let (status, body) = body_of(err.into()).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body, serde_json::json!({"error": "IP not found"}));
        }
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let (status, body) =
            body_of(AppError::Config("IP_DB_CONFIG is required".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({"error": "Internal server error"}));
    }
}
