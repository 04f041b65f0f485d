use thiserror::Error;

pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Typed aggregator failures.
///
/// The retryable/terminal split is structural, derived from the variant
/// rather than message substrings, so the orchestrator can persist the right
/// transaction state without parsing error text.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Could not reach the aggregator at all
    #[error("Network error: unable to reach data provider: {message}")]
    NetworkError { message: String },

    /// The HTTP call timed out
    #[error("data provider request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Aggregator responded with a server-side error (5xx)
    #[error("data provider unavailable (HTTP {status}): {message}")]
    ServiceUnavailable { status: u16, message: String },

    /// Aggregator rejected the request (4xx): bad plan id, bad network, auth
    #[error("data provider rejected request (HTTP {status}): {message}")]
    RequestRejected { status: u16, message: String },

    /// HTTP call succeeded but the response body reported a non-successful
    /// status, i.e. a business-level decline (insufficient balance, invalid plan)
    #[error("data purchase declined: {message}")]
    Declined { message: String },

    /// Response body could not be interpreted
    #[error("invalid data provider response: {message}")]
    InvalidResponse { message: String },
}

impl DeliveryError {
    pub fn retryable(&self) -> bool {
        match self {
            DeliveryError::NetworkError { .. } => true,
            DeliveryError::Timeout { .. } => true,
            DeliveryError::ServiceUnavailable { .. } => true,
            DeliveryError::RequestRejected { .. } => false,
            DeliveryError::Declined { .. } => false,
            DeliveryError::InvalidResponse { .. } => false,
        }
    }
}

impl From<DeliveryError> for crate::error::AppError {
    fn from(err: DeliveryError) -> Self {
        use crate::error::{AppError, AppErrorKind, ExternalError};

        let kind = match &err {
            DeliveryError::Timeout { seconds } => AppErrorKind::External(ExternalError::Timeout {
                service: "data provider".to_string(),
                timeout_secs: *seconds,
            }),
            _ => AppErrorKind::External(ExternalError::DeliveryProvider {
                provider: "gladtidings".to_string(),
                message: err.to_string(),
                is_retryable: err.retryable(),
            }),
        };
        AppError::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_retryable() {
        assert!(DeliveryError::NetworkError {
            message: "connection refused".to_string()
        }
        .retryable());
        assert!(DeliveryError::Timeout { seconds: 30 }.retryable());
        assert!(DeliveryError::ServiceUnavailable {
            status: 503,
            message: "maintenance".to_string()
        }
        .retryable());
    }

    #[test]
    fn business_failures_are_terminal() {
        assert!(!DeliveryError::Declined {
            message: "insufficient balance".to_string()
        }
        .retryable());
        assert!(!DeliveryError::RequestRejected {
            status: 400,
            message: "invalid plan".to_string()
        }
        .retryable());
        assert!(!DeliveryError::InvalidResponse {
            message: "not json".to_string()
        }
        .retryable());
    }

    #[test]
    fn timeout_converts_to_gateway_timeout_app_error() {
        let app: crate::error::AppError = DeliveryError::Timeout { seconds: 30 }.into();
        assert_eq!(app.status_code(), 504);
        assert!(app.is_retryable());
    }
}
