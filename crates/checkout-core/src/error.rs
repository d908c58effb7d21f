//! # Checkout Error Types
//!
//! Typed error handling for the plan-checkout workflow.
//! Every collaborator call returns `Result<T, CheckoutError>`.

use thiserror::Error;

/// Core error type for all checkout operations
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Configuration errors (missing store/channel id, bad base URL)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data supplied by the caller
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Subscription start returned no recognizable invoice identifier
    #[error("Invoice creation failed: no invoice id in response")]
    MissingInvoiceId,

    /// Payment confirmation returned neither a payment id nor an order id
    #[error("Payment start failed: no payment handle in response")]
    MissingPaymentHandle,

    /// Invoice identifier was present but not a positive integer
    #[error("Malformed invoice id: {value:?}")]
    MalformedInvoiceId { value: String },

    /// Network/HTTP error communicating with the backend or gateway
    #[error("Network error: {0}")]
    Network(String),

    /// Backend answered with a non-success HTTP status
    #[error("Backend error [{status}]: {message}")]
    Backend { status: u16, message: String },

    /// Gateway SDK reported an error code
    #[error("Gateway error [{code}]: {message}")]
    Gateway { code: String, message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error classes the flows react to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal to the current attempt, never retried
    Configuration,
    /// Hard protocol failure: aborts the current flow step
    Protocol,
    /// Network-level failure; only the poll loop tolerates these
    Transient,
    /// Backend or gateway rejected the request
    Rejected,
}

impl CheckoutError {
    /// Taxonomy class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::Configuration(_) => ErrorKind::Configuration,
            CheckoutError::InvalidRequest(_)
            | CheckoutError::MissingInvoiceId
            | CheckoutError::MissingPaymentHandle
            | CheckoutError::MalformedInvoiceId { .. }
            | CheckoutError::Serialization(_)
            | CheckoutError::Internal(_) => ErrorKind::Protocol,
            CheckoutError::Network(_) => ErrorKind::Transient,
            CheckoutError::Backend { status, .. } if *status >= 500 => ErrorKind::Transient,
            CheckoutError::Backend { .. } | CheckoutError::Gateway { .. } => ErrorKind::Rejected,
        }
    }

    /// Returns true if a later attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Message suitable for showing to the shopper.
    ///
    /// Backend and gateway messages are passed through since they are
    /// already written for end users.
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::Backend { message, .. } | CheckoutError::Gateway { message, .. } => {
                message.clone()
            }
            CheckoutError::Configuration(_) => {
                "Payment is not configured correctly. Please contact support.".to_string()
            }
            CheckoutError::Network(_) => "Could not reach the payment server.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for checkout operations
pub type CheckoutResult<T> = Result<T, CheckoutError>;
