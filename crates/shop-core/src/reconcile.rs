//! # Reconciliation Engine
//!
//! Turns settled payments into fulfilled orders. Both triggers, the buyer's
//! status poll and the gateway webhook, end up in [`Reconciler::confirm`].
//!
//! `confirm` and `cancel` hold a per-order async mutex across the whole
//! read-status / claim-stock / transition sequence, so a poll and a webhook
//! racing on the same order serialize: the first one claims a unit and
//! completes the order, the second sees a terminal status and returns it
//! unchanged. Notifications are queued after the lock is released and
//! delivered in the background; the upstream cancel call also runs unlocked.

use crate::catalog::Catalog;
use crate::error::{ShopError, ShopResult};
use crate::gateway::{BoxedPaymentGateway, SettlementStatus};
use crate::ledger::OrderLedger;
use crate::notify::{NotificationQueue, NotificationSink, ShopEvent};
use crate::order::{
    Fulfillment, Order, OrderIdGenerator, OrderTransition, OrderView, ProductSnapshot,
};
use crate::stock::StockPool;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Free units at or below which a low-stock warning is emitted
pub const DEFAULT_LOW_STOCK_THRESHOLD: usize = 3;

/// Minimum buyer name length, in characters, after trimming
pub const MIN_BUYER_NAME_CHARS: usize = 2;

pub const STOCK_EXHAUSTED_REASON: &str = "stock exhausted";

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub low_stock_threshold: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }
}

/// Inbound order request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub buyer_name: String,
    pub product_id: String,
    /// Chat id for credential delivery
    #[serde(default, alias = "telegramId")]
    pub notify_target: Option<String>,
}

/// Result of [`Reconciler::confirm`]
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    /// No such order (expired, or lost across a restart). Not an error.
    Unknown,
    /// Order was already terminal; nothing happened
    Unchanged(Order),
    Completed(Order),
    /// Payment succeeded but no stock was left; the order is now `failed`
    StockExhausted(Order),
}

impl ConfirmOutcome {
    pub fn order(&self) -> Option<&Order> {
        match self {
            ConfirmOutcome::Unknown => None,
            ConfirmOutcome::Unchanged(order)
            | ConfirmOutcome::Completed(order)
            | ConfirmOutcome::StockExhausted(order) => Some(order),
        }
    }

    /// Whether this call performed the transition
    pub fn transitioned(&self) -> bool {
        matches!(
            self,
            ConfirmOutcome::Completed(_) | ConfirmOutcome::StockExhausted(_)
        )
    }
}

/// Settlement push from the gateway, already parsed from the wire format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotice {
    pub order_id: String,
    pub status: String,
    /// Amount the provider settled, when the payload carries one
    pub amount: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Ignored,
    Handled(ConfirmOutcome),
}

/// Totals from one [`Reconciler::sweep_pending`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub completed: usize,
    pub failed: usize,
}

/// One async mutex per order id, created on first use.
///
/// An entry lives while any task holds or waits on its mutex, so every
/// caller for one order id contends on the same mutex.
#[derive(Debug, Default)]
struct OrderLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl OrderLocks {
    async fn handle(&self, order_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(order_id.to_string())
            .or_default()
            .clone()
    }

    /// Give back a handle obtained from [`OrderLocks::handle`], after its
    /// guard is dropped. The entry is removed only when no other task has
    /// cloned it; new clones are made under the same map lock.
    async fn release(&self, order_id: &str, handle: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        let idle = locks
            .get(order_id)
            .is_some_and(|current| Arc::ptr_eq(current, &handle))
            // the map's copy plus ours
            && Arc::strong_count(&handle) == 2;
        if idle {
            locks.remove(order_id);
        }
    }

    async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

pub struct Reconciler {
    catalog: Arc<dyn Catalog>,
    stock: Arc<dyn StockPool>,
    ledger: Arc<dyn OrderLedger>,
    gateway: BoxedPaymentGateway,
    notifications: NotificationQueue,
    ids: OrderIdGenerator,
    locks: OrderLocks,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Spawns the notification delivery task, so this must be called from
    /// within a Tokio runtime.
    pub fn new(
        catalog: Arc<dyn Catalog>,
        stock: Arc<dyn StockPool>,
        ledger: Arc<dyn OrderLedger>,
        gateway: BoxedPaymentGateway,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            catalog,
            stock,
            ledger,
            gateway,
            notifications: NotificationQueue::spawn(sink),
            ids: OrderIdGenerator::new(),
            locks: OrderLocks::default(),
            config: ReconcilerConfig::default(),
        }
    }

    /// Builder: override policy settings
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn gateway(&self) -> &BoxedPaymentGateway {
        &self.gateway
    }

    /// Create a pending order and its payment request.
    ///
    /// Rejections happen before any side effect; a failed payment request
    /// leaves no ledger entry.
    #[instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn create_order(&self, request: NewOrder) -> ShopResult<Order> {
        let buyer_name = request.buyer_name.trim();
        if buyer_name.chars().count() < MIN_BUYER_NAME_CHARS {
            return Err(ShopError::Validation(format!(
                "buyer name too short (min {} characters)",
                MIN_BUYER_NAME_CHARS
            )));
        }

        let product = self
            .catalog
            .get(&request.product_id)
            .await
            .ok_or_else(|| ShopError::ProductNotFound {
                product_id: request.product_id.clone(),
            })?;

        if self.stock.count_free(&product.id).await == 0 {
            return Err(ShopError::OutOfStock {
                product_id: product.id,
            });
        }

        let now = Utc::now();
        let order_id = self.ids.next_id(now);
        let snapshot = ProductSnapshot::from_product(&product);

        let payment = self
            .gateway
            .create_payment_request(&order_id, snapshot.price)
            .await
            .map_err(|e| {
                warn!(order_id = %order_id, error = %e, "payment request failed");
                e
            })?;

        let notify_target = request
            .notify_target
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let order = Order::new(order_id, buyer_name, snapshot, payment.payload, notify_target, now);
        self.ledger.insert(order.clone()).await?;

        info!(
            order_id = %order.id,
            amount = order.amount(),
            provider = %payment.provider,
            "order created"
        );
        self.notifications.push(ShopEvent::new_order(&order));
        Ok(order)
    }

    /// Confirm a settled payment for `order_id`. Idempotent.
    #[instrument(skip(self))]
    pub async fn confirm(&self, order_id: &str) -> ShopResult<ConfirmOutcome> {
        let handle = self.locks.handle(order_id).await;
        let guard = handle.clone().lock_owned().await;
        let result = self.confirm_locked(order_id).await;
        drop(guard);
        self.locks.release(order_id, handle).await;

        let (outcome, events) = result?;
        for event in events {
            self.notifications.push(event);
        }
        Ok(outcome)
    }

    async fn confirm_locked(&self, order_id: &str) -> ShopResult<(ConfirmOutcome, Vec<ShopEvent>)> {
        let Some(order) = self.ledger.get(order_id).await else {
            debug!("confirm for unknown order");
            return Ok((ConfirmOutcome::Unknown, Vec::new()));
        };

        if !order.is_pending() {
            debug!(status = %order.status, "order already settled");
            return Ok((ConfirmOutcome::Unchanged(order), Vec::new()));
        }

        let now = Utc::now();
        let expires_at = order
            .product
            .duration_unit
            .add_to(now, order.product.duration)
            .ok_or_else(|| ShopError::Internal(format!("expiry overflow for order {}", order.id)))?;

        let product_id = order.product.product_id.as_str();
        let unit = match self.stock.claim_one(product_id, &order.id, now).await {
            Ok(unit) => unit,
            Err(ShopError::OutOfStock { .. }) => {
                let failed = self
                    .ledger
                    .transition(
                        &order.id,
                        OrderTransition::Fail {
                            reason: STOCK_EXHAUSTED_REASON.to_string(),
                            at: now,
                        },
                    )
                    .await?;
                warn!(
                    order_id = %failed.id,
                    product_id = %product_id,
                    "payment settled but stock exhausted"
                );
                let events = vec![ShopEvent::stock_exhausted(&failed)];
                return Ok((ConfirmOutcome::StockExhausted(failed), events));
            }
            Err(e) => return Err(e),
        };

        let fulfillment = Fulfillment {
            credential: unit.credential.clone(),
            stock_unit_id: unit.id.clone(),
            completed_at: now,
            expires_at,
            expiry_date: Fulfillment::format_expiry(expires_at),
        };
        let completed = match self
            .ledger
            .transition(&order.id, OrderTransition::Complete(fulfillment))
            .await
        {
            Ok(completed) => completed,
            Err(e) => {
                let released = self.stock.release(product_id, &unit.id, &order.id).await;
                warn!(
                    order_id = %order.id,
                    stock_unit_id = %unit.id,
                    released,
                    error = %e,
                    "completion failed after claim, unit returned to pool"
                );
                return Err(e);
            }
        };

        info!(
            order_id = %completed.id,
            stock_unit_id = %unit.id,
            expires_at = %expires_at,
            "order completed"
        );

        let mut events = vec![ShopEvent::success(&completed)];
        if let (Some(target), Some(fulfillment)) = (&completed.notify_target, &completed.fulfillment) {
            events.push(ShopEvent::CredentialDelivery {
                target: target.clone(),
                order_id: completed.id.clone(),
                product_name: completed.product.name.clone(),
                credential: fulfillment.credential.clone(),
                expiry_date: fulfillment.expiry_date.clone(),
            });
        }

        let remaining = self.stock.count_free(product_id).await;
        if remaining <= self.config.low_stock_threshold {
            events.push(ShopEvent::LowStock {
                product_id: product_id.to_string(),
                product_name: completed.product.name.clone(),
                remaining,
            });
        }

        Ok((ConfirmOutcome::Completed(completed), events))
    }

    /// Poll trigger: returns the order's public view, confirming first when
    /// the gateway reports the payment as settled. `None` for unknown ids.
    #[instrument(skip(self))]
    pub async fn check(&self, order_id: &str) -> ShopResult<Option<OrderView>> {
        let Some(order) = self.ledger.get(order_id).await else {
            return Ok(None);
        };

        if order.is_pending() {
            match self.gateway.query_status(&order.id, order.amount()).await {
                SettlementStatus::Paid => {
                    if let Err(e) = self.confirm(&order.id).await {
                        warn!(error = %e, "confirm from poll failed");
                    }
                }
                status => debug!(?status, "payment not settled yet"),
            }
        }

        Ok(self
            .ledger
            .get(order_id)
            .await
            .map(|o| o.public_view(true)))
    }

    /// Push trigger: `paid`, `success` and `completed` confirm the order,
    /// anything else is ignored.
    #[instrument(skip(self, notice), fields(order_id = %notice.order_id, status = %notice.status))]
    pub async fn handle_webhook(&self, notice: WebhookNotice) -> ShopResult<WebhookOutcome> {
        if !SettlementStatus::from_provider_status(&notice.status).is_paid() {
            debug!("ignoring non-settlement webhook");
            return Ok(WebhookOutcome::Ignored);
        }

        if let Some(amount) = notice.amount {
            if let Some(order) = self.ledger.get(&notice.order_id).await {
                if order.amount() != amount {
                    warn!(
                        expected = order.amount(),
                        received = amount,
                        "webhook amount does not match order, ignoring"
                    );
                    return Ok(WebhookOutcome::Ignored);
                }
            }
        }

        let outcome = self.confirm(&notice.order_id).await?;
        Ok(WebhookOutcome::Handled(outcome))
    }

    /// Cancel a pending order. Terminal orders are rejected with
    /// `InvalidTransition`. The upstream cancel is best-effort.
    #[instrument(skip(self))]
    pub async fn cancel(&self, order_id: &str) -> ShopResult<Order> {
        let handle = self.locks.handle(order_id).await;
        let guard = handle.clone().lock_owned().await;
        let result = self
            .ledger
            .transition(order_id, OrderTransition::Cancel { at: Utc::now() })
            .await;
        drop(guard);
        self.locks.release(order_id, handle).await;

        let canceled = result?;
        info!(order_id = %canceled.id, "order canceled");
        self.notifications.push(ShopEvent::Canceled {
            order_id: canceled.id.clone(),
        });

        if let Err(e) = self
            .gateway
            .cancel_request(&canceled.id, canceled.amount())
            .await
        {
            warn!(order_id = %canceled.id, error = %e, "upstream cancel failed, local cancel stands");
        }
        Ok(canceled)
    }

    /// Public view without triggering confirmation
    pub async fn view(&self, order_id: &str) -> Option<OrderView> {
        self.ledger
            .get(order_id)
            .await
            .map(|o| o.public_view(false))
    }

    /// Query the gateway for every pending order and confirm the settled
    /// ones. Recovery pass for orders whose webhook was missed.
    #[instrument(skip(self))]
    pub async fn sweep_pending(&self) -> ShopResult<SweepReport> {
        let mut report = SweepReport::default();
        for order_id in self.ledger.pending_ids().await {
            let Some(order) = self.ledger.get(&order_id).await else {
                continue;
            };
            report.checked += 1;
            if !self
                .gateway
                .query_status(&order.id, order.amount())
                .await
                .is_paid()
            {
                continue;
            }
            match self.confirm(&order.id).await? {
                ConfirmOutcome::Completed(_) => report.completed += 1,
                ConfirmOutcome::StockExhausted(_) => report.failed += 1,
                _ => {}
            }
        }
        info!(
            checked = report.checked,
            completed = report.completed,
            failed = report.failed,
            "pending sweep finished"
        );
        Ok(report)
    }

    pub async fn recent_orders(&self, limit: usize) -> Vec<Order> {
        self.ledger.recent(limit).await
    }

    /// Wait for queued notifications to reach the sink
    pub async fn flush_notifications(&self) {
        self.notifications.flush().await;
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("gateway", &self.gateway.provider_name())
            .field("config", &self.config)
            .finish()
    }
}
