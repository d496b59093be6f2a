use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Webhook verification failed: {message}")]
    WebhookVerificationError { message: String },

    #[error("Provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::WebhookVerificationError { .. } => false,
            PaymentError::ProviderError { retryable, .. } => *retryable,
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{AppError, AppErrorKind, ExternalError};

        let retryable = err.is_retryable();
        AppError::new(AppErrorKind::External(ExternalError::PaymentGateway {
            message: err.to_string(),
            is_retryable: retryable,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_flags_are_set() {
        assert!(PaymentError::NetworkError {
            message: "timeout".to_string()
        }
        .is_retryable());
        assert!(!PaymentError::ValidationError {
            message: "bad amount".to_string(),
            field: Some("amount".to_string())
        }
        .is_retryable());
        assert!(!PaymentError::ProviderError {
            provider: "paystack".to_string(),
            message: "declined".to_string(),
            retryable: false
        }
        .is_retryable());
    }
}
