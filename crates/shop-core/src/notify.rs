//! # Notifications
//!
//! Typed events emitted by the reconciliation engine. Delivery is
//! fire-and-forget: the engine queues events on a [`NotificationQueue`] and
//! returns, a background task hands them to the sink in order. A failed
//! delivery is logged and never rolls back the transition that produced it.

use crate::error::ShopResult;
use crate::order::Order;
use crate::product::DurationUnit;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Event handed to a [`NotificationSink`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShopEvent {
    NewOrder {
        order_id: String,
        buyer_name: String,
        product_name: String,
        duration: u32,
        duration_unit: DurationUnit,
        amount: u64,
    },
    Success {
        order_id: String,
        buyer_name: String,
        product_name: String,
        amount: u64,
    },
    /// A paid order could not be fulfilled
    StockExhausted {
        order_id: String,
        product_id: String,
        product_name: String,
    },
    LowStock {
        product_id: String,
        product_name: String,
        remaining: usize,
    },
    Canceled {
        order_id: String,
    },
    /// Buyer-facing message carrying the credential
    CredentialDelivery {
        target: String,
        order_id: String,
        product_name: String,
        credential: String,
        expiry_date: String,
    },
}

impl ShopEvent {
    pub fn new_order(order: &Order) -> Self {
        ShopEvent::NewOrder {
            order_id: order.id.clone(),
            buyer_name: order.buyer_name.clone(),
            product_name: order.product.name.clone(),
            duration: order.product.duration,
            duration_unit: order.product.duration_unit,
            amount: order.amount(),
        }
    }

    pub fn success(order: &Order) -> Self {
        ShopEvent::Success {
            order_id: order.id.clone(),
            buyer_name: order.buyer_name.clone(),
            product_name: order.product.name.clone(),
            amount: order.amount(),
        }
    }

    pub fn stock_exhausted(order: &Order) -> Self {
        ShopEvent::StockExhausted {
            order_id: order.id.clone(),
            product_id: order.product.product_id.clone(),
            product_name: order.product.name.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ShopEvent::NewOrder { .. } => "NEW_ORDER",
            ShopEvent::Success { .. } => "SUCCESS",
            ShopEvent::StockExhausted { .. } => "STOCK_EXHAUSTED",
            ShopEvent::LowStock { .. } => "LOW_STOCK",
            ShopEvent::Canceled { .. } => "CANCELED",
            ShopEvent::CredentialDelivery { .. } => "CREDENTIAL_DELIVERY",
        }
    }

    /// Order the event refers to, if any
    pub fn order_id(&self) -> Option<&str> {
        match self {
            ShopEvent::NewOrder { order_id, .. }
            | ShopEvent::Success { order_id, .. }
            | ShopEvent::StockExhausted { order_id, .. }
            | ShopEvent::Canceled { order_id }
            | ShopEvent::CredentialDelivery { order_id, .. } => Some(order_id.as_str()),
            ShopEvent::LowStock { .. } => None,
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: ShopEvent) -> ShopResult<()>;
}

/// Default sink: writes events to the tracing log. Credentials are never logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    async fn notify(&self, event: ShopEvent) -> ShopResult<()> {
        match &event {
            ShopEvent::StockExhausted {
                order_id,
                product_id,
                ..
            } => warn!(order_id = %order_id, product_id = %product_id, "paid order could not be fulfilled"),
            ShopEvent::LowStock {
                product_id,
                remaining,
                ..
            } => warn!(product_id = %product_id, remaining, "stock running low"),
            other => info!(
                kind = other.kind(),
                order_id = other.order_id().unwrap_or("-"),
                "shop event"
            ),
        }
        Ok(())
    }
}

enum Delivery {
    Event(ShopEvent),
    Flush(oneshot::Sender<()>),
}

/// Ordered, non-blocking handoff to a [`NotificationSink`].
///
/// One delivery task per queue; it exits once every handle is dropped.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl NotificationQueue {
    /// Start the delivery task. Must be called from within a Tokio runtime.
    pub fn spawn(sink: Arc<dyn NotificationSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                match delivery {
                    Delivery::Event(event) => {
                        let kind = event.kind();
                        if let Err(e) = sink.notify(event).await {
                            warn!(kind, error = %e, "notification delivery failed");
                        }
                    }
                    Delivery::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("notification queue closed");
        });
        Self { tx }
    }

    pub fn push(&self, event: ShopEvent) {
        let kind = event.kind();
        if self.tx.send(Delivery::Event(event)).is_err() {
            warn!(kind, "notification queue closed, event dropped");
        }
    }

    /// Wait until every event queued before this call has been handed to the sink
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Delivery::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}
