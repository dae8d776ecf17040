use std::fmt;

use commerce_helcim_driver::ApiError;
use commerce_helcim_types::{ConfigError, PaymentState, PriceError};
use thiserror::Error;

use crate::repository::RepositoryError;

/// Message shown to customers when the processor could not be reached
pub const GENERIC_FAILURE_MESSAGE: &str = "Payment processing failed. Please try again.";

/// Gateway operation a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Process,
    Capture,
    Void,
    Refund,
    Refresh,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Process => write!(f, "process"),
            Operation::Capture => write!(f, "capture"),
            Operation::Void => write!(f, "void"),
            Operation::Refund => write!(f, "refund"),
            Operation::Refresh => write!(f, "refresh"),
        }
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Network failure, timeout or non-2xx answer from the processor
    #[error("{0}")]
    Transport(String),

    /// The processor answered with a body that could not be decoded
    #[error("Invalid JSON response from Helcim API: {0}")]
    Decode(String),

    /// The processor answered, but did not approve the transaction
    #[error("{message}")]
    Declined {
        operation: Operation,
        message: String,
    },

    /// The operation is not allowed for the payment as it stands
    #[error("Cannot {operation} payment: {reason}")]
    Precondition {
        operation: Operation,
        reason: String,
    },

    /// A redirect notification failed the amount hash check
    #[error("Payment origin has not been verified.")]
    Untrusted { order_id: String },

    #[error("No Helcim token found for this payment.")]
    MissingToken,

    #[error("Mock checkout tokens are not accepted by this gateway.")]
    MockTokenRejected,

    #[error("{}", .0.join(" "))]
    InvalidCard(Vec<String>),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Price(#[from] PriceError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl GatewayError {
    pub(crate) fn precondition(operation: Operation, reason: impl Into<String>) -> Self {
        GatewayError::Precondition {
            operation,
            reason: reason.into(),
        }
    }

    pub(crate) fn wrong_state(
        operation: Operation,
        state: PaymentState,
        expected: &[PaymentState],
    ) -> Self {
        let expected = expected
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self::precondition(
            operation,
            format!("state is '{}', expected one of: {}", state, expected),
        )
    }

    /// Text suitable for showing to the customer.
    ///
    /// Declines carry the processor's own wording; infrastructure failures
    /// collapse to a generic message.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::Transport(_)
            | GatewayError::Decode(_)
            | GatewayError::MissingToken
            | GatewayError::Repository(_)
            | GatewayError::Config(_) => GENERIC_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ApiError> for GatewayError {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::Decode(message) => GatewayError::Decode(message),
            other => GatewayError::Transport(other.to_string()),
        }
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
