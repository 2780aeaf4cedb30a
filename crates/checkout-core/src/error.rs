//! # Checkout Error Types
//!
//! Typed error handling for the checkout payment-method contract.
//! All widget and settlement operations return `Result<T, CheckoutError>`.
//!
//! The taxonomy follows what a widget has to do with the failure:
//! - local validation errors never reach the network,
//! - transport and business errors are surfaced to the listener and leave
//!   the widget interactive,
//! - busy / state errors are refusals, nothing was attempted.

use std::fmt;
use thiserror::Error;

/// Form field a validation failure points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    CardholderName,
    CardNumber,
    Expiry,
    Cvv,
    Amount,
    ReceiverId,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::CardholderName => "cardholderName",
            Field::CardNumber => "cardNumber",
            Field::Expiry => "expiry",
            Field::Cvv => "cvv",
            Field::Amount => "amount",
            Field::ReceiverId => "receiverId",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A local, field-targeted validation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ValidationError {
    pub field: Field,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: Field, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Core error type for all checkout operations
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Local validation failed; nothing was sent
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Network failure talking to the settlement endpoint
    #[error("Network error: {0}")]
    Transport(String),

    /// Settlement endpoint answered with a non-success response
    #[error("Payment rejected ({status}): {message}")]
    Business { status: u16, message: String },

    /// Settlement call did not resolve in time
    #[error("Payment request timed out after {0} seconds")]
    Timeout(u64),

    /// No bearer token available for the settlement call
    #[error("Not authenticated: no access token available")]
    Unauthenticated,

    /// Another submission holds the busy flag
    #[error("A payment is already being processed")]
    Busy,

    /// Operation not allowed in the widget's current phase
    #[error("Cannot {action} in {phase} state")]
    InvalidState {
        action: &'static str,
        phase: &'static str,
    },

    /// Configuration errors (missing base URL, receiver id, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CheckoutError {
    /// Returns true if the user may simply try again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::Transport(_)
                | CheckoutError::Timeout(_)
                | CheckoutError::Business { .. }
                | CheckoutError::Busy
        )
    }

    /// Returns true if the failure happened before any network call
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            CheckoutError::Validation(_)
                | CheckoutError::Busy
                | CheckoutError::InvalidState { .. }
                | CheckoutError::Unauthenticated
                | CheckoutError::Configuration(_)
        )
    }

    /// Text a widget shows inline and hands to `on_error`.
    /// Backend messages are passed through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::Validation(err) => err.reason.clone(),
            CheckoutError::Business { message, .. } => message.clone(),
            CheckoutError::Transport(_) => {
                "Unable to reach the payment service. Please try again.".to_string()
            }
            CheckoutError::Timeout(_) => {
                "The payment service did not respond in time. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Result type alias for checkout operations
pub type CheckoutResult<T> = Result<T, CheckoutError>;
