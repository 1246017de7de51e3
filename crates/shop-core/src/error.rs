//! # Shop Error Types
//!
//! Typed error handling for the storefront core.
//! Every fallible shop operation returns `Result<T, ShopError>`.
//!
//! Stock running out *after* payment is deliberately absent here: that is a
//! terminal order state (`failed`), not an error return.

use crate::order::OrderStatus;
use thiserror::Error;

/// Core error type for all shop operations
#[derive(Debug, Error)]
pub enum ShopError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Rejected input (short buyer name, non-positive price, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Product not found in catalog
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: String },

    /// Order not found in the ledger
    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    /// No free stock when the order was requested
    #[error("Out of stock: {product_id}")]
    OutOfStock { product_id: String },

    /// Order is not in a state that allows the requested transition
    #[error("Order {order_id} is {from}, cannot become {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Payment gateway rejected or failed the request
    #[error("Gateway error [{provider}]: {message}")]
    Gateway { provider: String, message: String },

    /// Network/HTTP error talking to an upstream service
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParseError(String),

    /// Notification delivery failed
    #[error("Notification error: {0}")]
    Notification(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShopError {
    /// Returns true if retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShopError::NetworkError(_) | ShopError::Gateway { .. } | ShopError::Notification(_)
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ShopError::Configuration(_) => 500,
            ShopError::Validation(_) => 400,
            ShopError::ProductNotFound { .. } => 404,
            ShopError::OrderNotFound { .. } => 404,
            ShopError::OutOfStock { .. } => 409,
            ShopError::InvalidTransition { .. } => 409,
            ShopError::Gateway { .. } => 502,
            ShopError::NetworkError(_) => 503,
            ShopError::WebhookParseError(_) => 400,
            ShopError::Notification(_) => 502,
            ShopError::Serialization(_) => 500,
            ShopError::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for ShopError {
    fn from(err: serde_json::Error) -> Self {
        ShopError::Serialization(err.to_string())
    }
}

/// Result type alias for shop operations
pub type ShopResult<T> = Result<T, ShopError>;
