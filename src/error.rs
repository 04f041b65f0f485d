//! Unified error handling for the storefront backend.
//!
//! Every API surface reports failures through [`AppError`], which maps to a
//! stable HTTP status code, a machine-readable [`ErrorCode`], and a
//! user-facing message. Upstream gateway and aggregator messages are
//! preserved for diagnostics; internal detail is only logged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-stable error codes for client handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "TRANSACTION_NOT_FOUND")]
    TransactionNotFound,
    #[serde(rename = "DATA_PLAN_NOT_FOUND")]
    DataPlanNotFound,
    #[serde(rename = "DATA_PLAN_UNAVAILABLE")]
    DataPlanUnavailable,
    #[serde(rename = "PAYMENT_NOT_FOUND")]
    PaymentNotFound,
    #[serde(rename = "INVALID_TRANSACTION_STATUS")]
    InvalidTransactionStatus,
    #[serde(rename = "AMOUNT_MISMATCH")]
    AmountMismatch,
    #[serde(rename = "PROVIDER_MAPPING_NOT_FOUND")]
    ProviderMappingNotFound,
    #[serde(rename = "PROVIDER_UNAVAILABLE")]
    ProviderUnavailable,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 504)
    #[serde(rename = "PAYMENT_GATEWAY_ERROR")]
    PaymentGatewayError,
    #[serde(rename = "DELIVERY_PROVIDER_ERROR")]
    DeliveryProviderError,
    #[serde(rename = "EXTERNAL_SERVICE_TIMEOUT")]
    ExternalServiceTimeout,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// Transaction with given ID doesn't exist
    TransactionNotFound { transaction_id: String },
    /// Catalog plan doesn't exist
    DataPlanNotFound { plan_id: String },
    /// Catalog plan exists but cannot be purchased right now
    DataPlanUnavailable { plan_id: String },
    /// No payment row matches the gateway reference
    PaymentNotFound { reference: String },
    /// Operation is not legal for the transaction's current status
    InvalidTransactionStatus { current: String, operation: String },
    /// Submitted amount differs from the plan's current price
    AmountMismatch { expected: String, provided: String },
    /// No active plan-to-provider mapping exists for the plan
    ProviderMappingNotFound { plan_id: String },
    /// The configured delivery provider is marked inactive
    ProviderUnavailable { provider: String },
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    Database { message: String, is_retryable: bool },
    Configuration { message: String },
}

/// External service errors (payment gateway, telecom aggregator)
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// ErcasPay hosted checkout error
    PaymentGateway {
        message: String,
        is_retryable: bool,
    },
    /// Telecom aggregator (GladTidings) error
    DeliveryProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },
    /// External service timeout
    Timeout { service: String, timeout_secs: u64 },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Phone number failed format or network-prefix validation
    InvalidPhoneNumber { reason: String },
    /// Network is not one of the supported enumeration
    InvalidNetwork { network: String },
    /// Required field missing
    MissingField { field: String },
    /// Amount is malformed or out of range
    InvalidAmount { amount: String, reason: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn domain(err: DomainError) -> Self {
        Self::new(AppErrorKind::Domain(err))
    }

    pub fn validation(err: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(err))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::TransactionNotFound { .. } => 404,
                DomainError::DataPlanNotFound { .. } => 404,
                DomainError::DataPlanUnavailable { .. } => 400,
                DomainError::PaymentNotFound { .. } => 404,
                DomainError::InvalidTransactionStatus { .. } => 409, // Conflict
                DomainError::AmountMismatch { .. } => 400,
                DomainError::ProviderMappingNotFound { .. } => 400,
                DomainError::ProviderUnavailable { .. } => 503,
            },
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { .. } => 502, // Bad Gateway
                ExternalError::DeliveryProvider { .. } => 502,
                ExternalError::Timeout { .. } => 504, // Gateway Timeout
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
                DomainError::DataPlanNotFound { .. } => ErrorCode::DataPlanNotFound,
                DomainError::DataPlanUnavailable { .. } => ErrorCode::DataPlanUnavailable,
                DomainError::PaymentNotFound { .. } => ErrorCode::PaymentNotFound,
                DomainError::InvalidTransactionStatus { .. } => ErrorCode::InvalidTransactionStatus,
                DomainError::AmountMismatch { .. } => ErrorCode::AmountMismatch,
                DomainError::ProviderMappingNotFound { .. } => ErrorCode::ProviderMappingNotFound,
                DomainError::ProviderUnavailable { .. } => ErrorCode::ProviderUnavailable,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { .. } => ErrorCode::PaymentGatewayError,
                ExternalError::DeliveryProvider { .. } => ErrorCode::DeliveryProviderError,
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::TransactionNotFound { transaction_id } => {
                    format!("Transaction '{}' not found", transaction_id)
                }
                DomainError::DataPlanNotFound { plan_id } => {
                    format!("Data plan '{}' not found", plan_id)
                }
                DomainError::DataPlanUnavailable { plan_id } => {
                    format!("Data plan '{}' is currently unavailable", plan_id)
                }
                DomainError::PaymentNotFound { reference } => {
                    format!("Payment with reference '{}' not found", reference)
                }
                DomainError::InvalidTransactionStatus { current, operation } => {
                    format!(
                        "Cannot {} while transaction status is '{}'",
                        operation, current
                    )
                }
                DomainError::AmountMismatch { expected, provided } => {
                    format!(
                        "Amount {} does not match the plan price {}",
                        provided, expected
                    )
                }
                DomainError::ProviderMappingNotFound { plan_id } => {
                    format!("No delivery provider configured for plan '{}'", plan_id)
                }
                DomainError::ProviderUnavailable { provider } => {
                    format!("Data provider '{}' is currently unavailable", provider)
                }
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway {
                    message,
                    is_retryable,
                } => {
                    if *is_retryable {
                        "Payment gateway is temporarily unavailable. Please try again".to_string()
                    } else {
                        format!("Payment processing failed: {}", message)
                    }
                }
                ExternalError::DeliveryProvider {
                    message,
                    is_retryable,
                    ..
                } => {
                    if *is_retryable {
                        "Data provider is temporarily unavailable. Please try again".to_string()
                    } else {
                        format!("Data purchase failed: {}", message)
                    }
                }
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => {
                    format!(
                        "{} request timed out after {} seconds. Please try again",
                        service, timeout_secs
                    )
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidPhoneNumber { reason } => {
                    format!("Invalid phone number: {}", reason)
                }
                ValidationError::InvalidNetwork { network } => {
                    format!(
                        "Invalid network '{}'. Supported: mtn, airtel, glo, 9mobile",
                        network
                    )
                }
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount '{}': {}", amount, reason)
                }
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(err) => {
                matches!(err, DomainError::ProviderUnavailable { .. })
            }
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { is_retryable, .. } => *is_retryable,
                ExternalError::DeliveryProvider { is_retryable, .. } => *is_retryable,
                ExternalError::Timeout { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

// Conversions from specific error types live next to those types:
// database/error.rs, payments/error.rs and delivery/error.rs each implement
// From<...> for AppError.

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

impl From<crate::validation::PhoneValidationError> for AppError {
    fn from(err: crate::validation::PhoneValidationError) -> Self {
        use crate::validation::PhoneValidationError as PVE;
        let kind = match err {
            PVE::UnknownNetwork { network } => {
                AppErrorKind::Validation(ValidationError::InvalidNetwork { network })
            }
            other => AppErrorKind::Validation(ValidationError::InvalidPhoneNumber {
                reason: other.to_string(),
            }),
        };
        AppError::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_status_maps_to_conflict() {
        let error = AppError::domain(DomainError::InvalidTransactionStatus {
            current: "completed".to_string(),
            operation: "initialize payment".to_string(),
        });

        assert_eq!(error.status_code(), 409);
        assert_eq!(error.error_code(), ErrorCode::InvalidTransactionStatus);
        assert!(error.user_message().contains("completed"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn not_found_errors_map_to_404() {
        let error = AppError::domain(DomainError::TransactionNotFound {
            transaction_id: "abc".to_string(),
        });
        assert_eq!(error.status_code(), 404);

        let error = AppError::domain(DomainError::PaymentNotFound {
            reference: "ERC-1".to_string(),
        });
        assert_eq!(error.status_code(), 404);
    }

    #[test]
    fn upstream_errors_map_to_bad_gateway() {
        let error = AppError::new(AppErrorKind::External(ExternalError::DeliveryProvider {
            provider: "gladtidings".to_string(),
            message: "balance too low".to_string(),
            is_retryable: false,
        }));

        assert_eq!(error.status_code(), 502);
        assert_eq!(error.error_code(), ErrorCode::DeliveryProviderError);
        assert!(!error.is_retryable());
    }

    #[test]
    fn provider_unavailable_is_retryable_503() {
        let error = AppError::domain(DomainError::ProviderUnavailable {
            provider: "gladtidings".to_string(),
        });
        assert_eq!(error.status_code(), 503);
        assert!(error.is_retryable());
    }

    #[test]
    fn validation_error_maps_to_400() {
        let error = AppError::validation(ValidationError::InvalidNetwork {
            network: "vodafone".to_string(),
        });
        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::ValidationError);
        assert!(!error.is_retryable());
    }
}
