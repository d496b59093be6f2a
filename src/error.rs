//! Unified error handling for the Paylink backend
//!
//! Provides a single application error type with HTTP status mapping,
//! user-facing messages, and structured error codes for client handling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error codes returned to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "INVALID_AMOUNT")]
    InvalidAmount,
    #[serde(rename = "TRANSACTION_NOT_FOUND")]
    TransactionNotFound,
    #[serde(rename = "DUPLICATE_REFERENCE")]
    DuplicateReference,
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,
    #[serde(rename = "INVALID_SIGNATURE")]
    InvalidSignature,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 504)
    #[serde(rename = "PAYMENT_GATEWAY_ERROR")]
    PaymentGatewayError,
    #[serde(rename = "OAUTH_PROVIDER_ERROR")]
    OAuthProviderError,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// Amount below the configured minimum or otherwise unpayable
    InvalidAmount { amount: i64, minimum: i64 },
    /// Transaction with the given reference doesn't exist
    TransactionNotFound { reference: String },
    /// A transaction with this reference already exists
    DuplicateReference { reference: String },
    /// OAuth authorization code was rejected by the provider
    InvalidAuthorizationCode,
    /// Webhook signature did not match the payload
    InvalidWebhookSignature,
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    Database { message: String, is_retryable: bool },
    Configuration { message: String },
}

/// External service errors (payment gateway, OAuth provider)
#[derive(Debug, Clone)]
pub enum ExternalError {
    PaymentGateway {
        message: String,
        is_retryable: bool,
    },
    OAuthProvider {
        message: String,
    },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    MissingField { field: String },
    InvalidField { field: String, reason: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
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
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::InvalidAmount { .. } => 400,
                DomainError::TransactionNotFound { .. } => 404,
                DomainError::DuplicateReference { .. } => 409,
                DomainError::InvalidAuthorizationCode => 401,
                DomainError::InvalidWebhookSignature => 400,
            },
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { .. } => 502,
                ExternalError::OAuthProvider { .. } => 502,
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::InvalidAmount { .. } => ErrorCode::InvalidAmount,
                DomainError::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
                DomainError::DuplicateReference { .. } => ErrorCode::DuplicateReference,
                DomainError::InvalidAuthorizationCode => ErrorCode::Unauthorized,
                DomainError::InvalidWebhookSignature => ErrorCode::InvalidSignature,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { .. } => ErrorCode::PaymentGatewayError,
                ExternalError::OAuthProvider { .. } => ErrorCode::OAuthProviderError,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::InvalidAmount { amount, minimum } => {
                    format!(
                        "Amount {} is below the minimum payable amount of {}",
                        amount, minimum
                    )
                }
                DomainError::TransactionNotFound { reference } => {
                    format!("Transaction '{}' not found", reference)
                }
                DomainError::DuplicateReference { reference } => {
                    format!("Transaction '{}' already exists", reference)
                }
                DomainError::InvalidAuthorizationCode => {
                    "Invalid authorization code".to_string()
                }
                DomainError::InvalidWebhookSignature => "Invalid webhook signature".to_string(),
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { is_retryable, .. } => {
                    if *is_retryable {
                        "Payment gateway is temporarily unavailable. Please try again".to_string()
                    } else {
                        "Payment gateway returned an error".to_string()
                    }
                }
                ExternalError::OAuthProvider { .. } => {
                    "Failed to authenticate with the identity provider".to_string()
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::InvalidField { field, reason } => {
                    format!("Invalid value for field '{}': {}", field, reason)
                }
            },
        }
    }

    /// Check if the failed operation may succeed on retry
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { is_retryable, .. } => *is_retryable,
                ExternalError::OAuthProvider { .. } => false,
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

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_amount_error() {
        let error = AppError::new(AppErrorKind::Domain(DomainError::InvalidAmount {
            amount: 50,
            minimum: 100,
        }));

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::InvalidAmount);
        assert!(error.user_message().contains("minimum"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_not_found_error() {
        let error = AppError::new(AppErrorKind::Domain(DomainError::TransactionNotFound {
            reference: "txn_missing".to_string(),
        }));

        assert_eq!(error.status_code(), 404);
        assert_eq!(error.error_code(), ErrorCode::TransactionNotFound);
    }

    #[test]
    fn test_duplicate_reference_conflict() {
        let error = AppError::new(AppErrorKind::Domain(DomainError::DuplicateReference {
            reference: "txn_1".to_string(),
        }));

        assert_eq!(error.status_code(), 409);
    }

    #[test]
    fn test_gateway_error_is_bad_gateway() {
        let error = AppError::new(AppErrorKind::External(ExternalError::PaymentGateway {
            message: "upstream 500".to_string(),
            is_retryable: true,
        }));

        assert_eq!(error.status_code(), 502);
        assert!(error.is_retryable());
    }

    #[test]
    fn test_invalid_signature_is_rejected_as_bad_request() {
        let error = AppError::new(AppErrorKind::Domain(DomainError::InvalidWebhookSignature));

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::InvalidSignature);
    }
}
