//! Error response formatting
//!
//! Provides standardized error responses with consistent JSON structure,
//! HTTP status codes, error codes, and user-friendly messages.

use crate::error::{AppError, ErrorCode};
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Standardized error response structure
///
/// This is returned to clients for all error cases, ensuring
/// consistent error handling across the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Request ID for debugging and support
    pub request_id: Option<String>,

    /// ISO 8601 timestamp of the error
    pub timestamp: String,

    /// Optional additional details (e.g., the current transaction status)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Whether the client should retry the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorResponse {
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            error: error.error_code(),
            message: error.user_message(),
            request_id: error.request_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            details: None,
            retryable: Some(error.is_retryable()),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn internal_error(request_id: Option<String>) -> Self {
        Self {
            error: ErrorCode::InternalError,
            message: "An internal server error occurred. Please try again later.".to_string(),
            request_id,
            timestamp: Utc::now().to_rfc3339(),
            details: None,
            retryable: Some(false),
        }
    }
}

/// Convert AppError into an HTTP response with proper status code and JSON
/// body. Server-side detail is logged here; the client sees only the
/// user-facing message.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Server error occurred"
            );
        } else {
            tracing::warn!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Client error occurred"
            );
        }

        // State conflicts echo the current status back for the client
        let mut error_response = ErrorResponse::from_app_error(&self);
        if let crate::error::AppErrorKind::Domain(
            crate::error::DomainError::InvalidTransactionStatus { current, .. },
        ) = &self.kind
        {
            error_response =
                error_response.with_details(serde_json::json!({ "current_status": current }));
        }

        (status_code, Json(error_response)).into_response()
    }
}

/// Extract the request id set by the request-id middleware
pub fn get_request_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;

    #[test]
    fn error_response_carries_code_and_retry_flag() {
        let error = AppError::domain(DomainError::TransactionNotFound {
            transaction_id: "abc".to_string(),
        });
        let response = ErrorResponse::from_app_error(&error);
        assert_eq!(response.error, ErrorCode::TransactionNotFound);
        assert_eq!(response.retryable, Some(false));
        assert!(response.message.contains("abc"));
    }

    #[test]
    fn conflict_response_includes_current_status() {
        let error = AppError::domain(DomainError::InvalidTransactionStatus {
            current: "processing".to_string(),
            operation: "retry data purchase".to_string(),
        });
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
