//! # Order Types
//!
//! Orders, their lifecycle states and the public view handed to buyers.

use crate::error::{ShopError, ShopResult};
use crate::product::{DurationUnit, Product};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle state of an order
///
/// ```text
///             ┌──► completed
///   pending ──┼──► failed      (paid, but stock ran out)
///             └──► canceled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
            OrderStatus::Canceled => "canceled",
        }
    }

    /// No transition leaves a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product fields copied onto the order at creation time, so later catalog
/// edits never alter historical orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    pub duration: u32,
    pub duration_unit: DurationUnit,
    /// Amount charged, passed verbatim to every gateway call
    pub price: u64,
}

impl ProductSnapshot {
    pub fn from_product(product: &Product) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            emoji: product.emoji.clone(),
            duration: product.duration,
            duration_unit: product.duration_unit,
            price: product.price,
        }
    }
}

/// What a completed order received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fulfillment {
    pub credential: String,
    pub stock_unit_id: String,
    pub completed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Human-readable expiry, e.g. "28 February 2025"
    pub expiry_date: String,
}

impl Fulfillment {
    pub fn format_expiry(expires_at: DateTime<Utc>) -> String {
        expires_at.format("%d %B %Y").to_string()
    }
}

/// A requested status change, applied by the ledger
#[derive(Debug, Clone, PartialEq)]
pub enum OrderTransition {
    Complete(Fulfillment),
    Fail {
        reason: String,
        at: DateTime<Utc>,
    },
    Cancel {
        at: DateTime<Utc>,
    },
}

impl OrderTransition {
    pub fn target(&self) -> OrderStatus {
        match self {
            OrderTransition::Complete(_) => OrderStatus::Completed,
            OrderTransition::Fail { .. } => OrderStatus::Failed,
            OrderTransition::Cancel { .. } => OrderStatus::Canceled,
        }
    }
}

/// An order in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// `DS-<unix millis>-<sequence>`
    pub id: String,

    pub buyer_name: String,

    pub product: ProductSnapshot,

    pub status: OrderStatus,

    /// Raw QR payload returned by the payment gateway
    pub qr_raw: String,

    /// Chat id that receives the credential on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_target: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Set only when `status == Completed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment: Option<Fulfillment>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a pending order
    pub fn new(
        id: impl Into<String>,
        buyer_name: impl Into<String>,
        product: ProductSnapshot,
        qr_raw: impl Into<String>,
        notify_target: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            buyer_name: buyer_name.into(),
            product,
            status: OrderStatus::Pending,
            qr_raw: qr_raw.into(),
            notify_target,
            created_at,
            fulfillment: None,
            failure_reason: None,
            closed_at: None,
        }
    }

    pub fn amount(&self) -> u64 {
        self.product.price
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    pub fn credential(&self) -> Option<&str> {
        self.fulfillment.as_ref().map(|f| f.credential.as_str())
    }

    /// Apply a transition. Only a pending order may change state.
    pub fn apply(&mut self, transition: OrderTransition) -> ShopResult<()> {
        if self.status.is_terminal() {
            return Err(ShopError::InvalidTransition {
                order_id: self.id.clone(),
                from: self.status,
                to: transition.target(),
            });
        }

        self.status = transition.target();
        match transition {
            OrderTransition::Complete(fulfillment) => {
                self.closed_at = Some(fulfillment.completed_at);
                self.fulfillment = Some(fulfillment);
            }
            OrderTransition::Fail { reason, at } => {
                self.failure_reason = Some(reason);
                self.closed_at = Some(at);
            }
            OrderTransition::Cancel { at } => {
                self.closed_at = Some(at);
            }
        }
        Ok(())
    }

    /// Buyer-facing view. The credential is only present once completed.
    pub fn public_view(&self, include_qr: bool) -> OrderView {
        let fulfillment = self
            .fulfillment
            .as_ref()
            .filter(|_| self.status == OrderStatus::Completed);

        OrderView {
            order_id: self.id.clone(),
            buyer_name: self.buyer_name.clone(),
            product_name: self.product.name.clone(),
            product_emoji: self.product.emoji.clone(),
            duration: self.product.duration,
            duration_type: self.product.duration_unit,
            amount: self.product.price,
            status: self.status,
            qr_raw: include_qr.then(|| self.qr_raw.clone()),
            credential: fulfillment.map(|f| f.credential.clone()),
            expired_at: fulfillment.map(|f| f.expiry_date.clone()),
            created_at: self.created_at,
        }
    }
}

/// Public order view returned from status queries
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order_id: String,
    pub buyer_name: String,
    pub product_name: String,
    pub product_emoji: Option<String>,
    pub duration: u32,
    pub duration_type: DurationUnit,
    pub amount: u64,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_raw: Option<String>,
    pub credential: Option<String>,
    pub expired_at: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Generates `DS-<unix millis>-<sequence>` ids.
///
/// The process-wide sequence makes ids unique even within one millisecond;
/// the millisecond prefix keeps them sortable by creation time.
#[derive(Debug, Default)]
pub struct OrderIdGenerator {
    sequence: AtomicU64,
}

impl OrderIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self, now: DateTime<Utc>) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("DS-{}-{:06}", now.timestamp_millis(), seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn snapshot() -> ProductSnapshot {
        ProductSnapshot {
            product_id: "nflx".into(),
            name: "Netflix Premium".into(),
            emoji: Some("🎬".into()),
            duration: 1,
            duration_unit: DurationUnit::Month,
            price: 15000,
        }
    }

    fn pending() -> Order {
        Order::new("DS-1-000001", "Budi", snapshot(), "000201...", None, Utc::now())
    }

    fn fulfillment() -> Fulfillment {
        let expires_at = Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap();
        Fulfillment {
            credential: "budi@mail.com:secret".into(),
            stock_unit_id: "u1".into(),
            completed_at: Utc::now(),
            expires_at,
            expiry_date: Fulfillment::format_expiry(expires_at),
        }
    }

    #[test]
    fn test_complete_sets_fulfillment() {
        let mut order = pending();
        order.apply(OrderTransition::Complete(fulfillment())).unwrap();

        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.credential(), Some("budi@mail.com:secret"));
        assert!(order.closed_at.is_some());
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let mut order = pending();
        order.apply(OrderTransition::Cancel { at: Utc::now() }).unwrap();

        let err = order
            .apply(OrderTransition::Complete(fulfillment()))
            .unwrap_err();
        assert!(matches!(
            err,
            ShopError::InvalidTransition {
                from: OrderStatus::Canceled,
                to: OrderStatus::Completed,
                ..
            }
        ));
        assert!(order.fulfillment.is_none());
    }

    #[test]
    fn test_failed_order_keeps_reason_and_no_credential() {
        let mut order = pending();
        order
            .apply(OrderTransition::Fail {
                reason: "stock exhausted".into(),
                at: Utc::now(),
            })
            .unwrap();

        assert_eq!(order.failure_reason.as_deref(), Some("stock exhausted"));
        let view = order.public_view(false);
        assert_eq!(view.status, OrderStatus::Failed);
        assert!(view.credential.is_none());
        assert!(view.expired_at.is_none());
    }

    #[test]
    fn test_public_view_hides_credential_until_completed() {
        let mut order = pending();
        let view = order.public_view(true);
        assert!(view.credential.is_none());
        assert_eq!(view.qr_raw.as_deref(), Some("000201..."));

        order.apply(OrderTransition::Complete(fulfillment())).unwrap();
        let view = order.public_view(false);
        assert_eq!(view.credential.as_deref(), Some("budi@mail.com:secret"));
        assert_eq!(view.expired_at.as_deref(), Some("28 February 2025"));
        assert!(view.qr_raw.is_none());
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let json = serde_json::to_value(pending().public_view(true)).unwrap();
        assert_eq!(json["orderId"], "DS-1-000001");
        assert_eq!(json["durationType"], "month");
        assert_eq!(json["status"], "pending");
        assert!(json["credential"].is_null());
    }

    #[test]
    fn test_order_ids_unique_and_sortable() {
        let ids = OrderIdGenerator::new();
        let now = Utc::now();
        let a = ids.next_id(now);
        let b = ids.next_id(now);
        let c = ids.next_id(now + Duration::milliseconds(5));

        assert!(a.starts_with("DS-"));
        assert_ne!(a, b);
        assert!(a < b);
        assert!(b < c);
    }
}
