//! Checkout Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Failures reported by a payment provider call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// No secret key configured for the current mode
    #[error("Stripe secret key is not defined.")]
    NoCredential,

    /// DNS, connect or timeout failure
    #[error("{detail}")]
    Transport { detail: String },

    /// The provider rejected the request
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        raw_body: String,
    },
}

impl ProviderError {
    /// HTTP status to report; 500 when the provider never answered
    pub const fn status(&self) -> u16 {
        match self {
            Self::Api { status, .. } => *status,
            Self::NoCredential | Self::Transport { .. } => 500,
        }
    }
}

/// Checkout-related errors
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Tampered or invalid user input
    #[error("{reason}")]
    Validation { field: &'static str, reason: String },

    /// Provider call failed
    #[error("Stripe error: ({}) {}", .0.status(), .0)]
    Provider(#[from] ProviderError),

    /// Provider answered 2xx but without a hosted page
    #[error("Unexpected Stripe response")]
    UnexpectedResponse,

    /// Returned session id does not match the stored record
    #[error("Wrong payment id.")]
    Integrity,

    /// Short-lived store failure
    #[error("Unable to record checkout session.")]
    Storage(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CheckoutError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Message shown to the visitor after the error redirect
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Operator-facing problems (keys, provider integration) as opposed to
    /// visitor input or tampering
    pub const fn is_operator_error(&self) -> bool {
        matches!(
            self,
            Self::Provider(_) | Self::UnexpectedResponse | Self::Storage(_) | Self::Config(_)
        )
    }
}

/// Short-lived store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_message_format() {
        let err = CheckoutError::from(ProviderError::Api {
            status: 402,
            message: "card_declined".into(),
            raw_body: String::new(),
        });
        assert_eq!(err.user_message(), "Stripe error: (402) card_declined");
    }

    #[test]
    fn test_unknown_status_defaults_to_500() {
        let err = CheckoutError::from(ProviderError::Transport {
            detail: "connection refused".into(),
        });
        assert_eq!(err.user_message(), "Stripe error: (500) connection refused");

        let err = CheckoutError::from(ProviderError::NoCredential);
        assert_eq!(
            err.user_message(),
            "Stripe error: (500) Stripe secret key is not defined."
        );
        assert!(err.is_operator_error());
    }

    #[test]
    fn test_validation_is_not_operator_error() {
        let err = CheckoutError::validation("amount", "Amount must be >= 1 cent.");
        assert_eq!(err.user_message(), "Amount must be >= 1 cent.");
        assert!(!err.is_operator_error());
    }
}
