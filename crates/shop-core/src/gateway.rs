//! # Payment Gateway Trait
//!
//! Seam between the reconciliation core and a QR payment provider.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  PaymentGateway (trait)                     │
//! │  ├── create_payment_request()                               │
//! │  ├── query_status()                                         │
//! │  ├── cancel_request()                                       │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                ┌───────────┴───────────┐
//!        ┌───────┴───────┐       ┌───────┴───────┐
//!        │ PakasirGateway│       │  MockGateway  │
//!        └───────────────┘       └───────────────┘
//! ```
//!
//! Every call is keyed by `(order_id, amount)`; the provider correlates on
//! both, so the amount must be the one recorded when the order was created.

use crate::error::ShopResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A created payment request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Raw QR payload to render for the buyer
    pub payload: String,
    pub provider: String,
}

/// Settlement state reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    Paid,
    /// Unreachable provider, timeout or unrecognised status. Retry later.
    Unknown,
}

impl SettlementStatus {
    /// Map a provider status string. `paid`, `success` and `completed` all
    /// mean the funds arrived.
    pub fn from_provider_status(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "paid" | "success" | "completed" => SettlementStatus::Paid,
            "pending" => SettlementStatus::Pending,
            _ => SettlementStatus::Unknown,
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, SettlementStatus::Paid)
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment request for the order.
    async fn create_payment_request(&self, order_id: &str, amount: u64) -> ShopResult<PaymentRequest>;

    /// Ask the provider whether the order settled. Never fails: transport
    /// problems report `SettlementStatus::Unknown`.
    async fn query_status(&self, order_id: &str, amount: u64) -> SettlementStatus;

    /// Cancel the upstream request. Callers treat failure as best-effort.
    async fn cancel_request(&self, order_id: &str, amount: u64) -> ShopResult<()>;

    /// Provider name (for logging and routing).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared payment gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settlement_mapping() {
        assert_eq!(SettlementStatus::from_provider_status("paid"), SettlementStatus::Paid);
        assert_eq!(SettlementStatus::from_provider_status("SUCCESS"), SettlementStatus::Paid);
        assert_eq!(
            SettlementStatus::from_provider_status(" Completed "),
            SettlementStatus::Paid
        );
        assert_eq!(
            SettlementStatus::from_provider_status("pending"),
            SettlementStatus::Pending
        );
        assert_eq!(
            SettlementStatus::from_provider_status("expired"),
            SettlementStatus::Unknown
        );
        assert_eq!(SettlementStatus::from_provider_status(""), SettlementStatus::Unknown);
    }
}
