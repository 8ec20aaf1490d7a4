//! # Payment Error Types
//!
//! Typed error handling for the giftpay payment flow.
//! All payment operations return `Result<T, PaymentError>`.

use thiserror::Error;

/// Core error type for all payment operations
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Configuration errors (missing credentials, invalid env)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Bad client input (e.g. amount below the minimum)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider rejected our client credentials
    #[error("Authentication with {provider} failed: {message}")]
    Auth { provider: String, message: String },

    /// Non-2xx response from the payment provider
    #[error("Provider error [{provider}]: {message}")]
    Provider {
        provider: String,
        message: String,
        /// Upstream error body, kept for diagnostics
        details: Option<serde_json::Value>,
    },

    /// Network/HTTP error communicating with the provider (includes timeouts)
    #[error("Network error: {0}")]
    Network(String),

    /// The email relay failed. Logged, never propagated by the payment flow.
    #[error("Notification error: {0}")]
    Notification(String),

    /// Callback authorization token missing or wrong
    #[error("Callback unauthorized: {0}")]
    CallbackUnauthorized(String),

    /// No stored order with this id
    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (repository backend failure and the like)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    /// Build a provider error without upstream details
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        PaymentError::Provider {
            provider: provider.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::Network(_) | PaymentError::Provider { .. }
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::Validation(_) => 400,
            PaymentError::CallbackUnauthorized(_) => 401,
            PaymentError::OrderNotFound { .. } => 404,
            PaymentError::Configuration(_)
            | PaymentError::Auth { .. }
            | PaymentError::Provider { .. }
            | PaymentError::Network(_)
            | PaymentError::Notification(_)
            | PaymentError::Serialization(_)
            | PaymentError::Internal(_) => 500,
        }
    }

    /// Message that is safe to show to a client.
    ///
    /// Credential failures get a generic message so nothing about the
    /// merchant's provider setup leaks out.
    pub fn public_message(&self) -> String {
        match self {
            PaymentError::Auth { provider, .. } => {
                format!("Failed to authenticate with {}", provider)
            }
            PaymentError::Configuration(_) | PaymentError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Upstream diagnostic payload, if any
    pub fn details(&self) -> Option<&serde_json::Value> {
        match self {
            PaymentError::Provider { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}

/// Result type alias for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;
