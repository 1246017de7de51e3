//! # Order Ledger
//!
//! Single source of truth for orders and their status.

use crate::error::{ShopError, ShopResult};
use crate::order::{Order, OrderTransition};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Store a new order. Ids must be unique.
    async fn insert(&self, order: Order) -> ShopResult<()>;

    async fn get(&self, order_id: &str) -> Option<Order>;

    /// Apply a transition atomically and return the updated order.
    ///
    /// Fails with `InvalidTransition` unless the order is pending.
    async fn transition(&self, order_id: &str, transition: OrderTransition) -> ShopResult<Order>;

    /// Newest orders first
    async fn recent(&self, limit: usize) -> Vec<Order>;

    async fn pending_ids(&self) -> Vec<String>;
}

/// A thread-safe in-memory order ledger.
#[derive(Debug, Default)]
pub struct InMemoryOrderLedger {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderLedger for InMemoryOrderLedger {
    async fn insert(&self, order: Order) -> ShopResult<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(ShopError::Internal(format!("duplicate order id {}", order.id)));
        }
        orders.insert(order.id.clone(), order);
        Ok(())
    }

    async fn get(&self, order_id: &str) -> Option<Order> {
        self.orders.read().await.get(order_id).cloned()
    }

    async fn transition(&self, order_id: &str, transition: OrderTransition) -> ShopResult<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| ShopError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        order.apply(transition)?;
        Ok(order.clone())
    }

    async fn recent(&self, limit: usize) -> Vec<Order> {
        let orders = self.orders.read().await;
        let mut list: Vec<Order> = orders.values().cloned().collect();
        list.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        list.truncate(limit);
        list
    }

    async fn pending_ids(&self) -> Vec<String> {
        let orders = self.orders.read().await;
        let mut ids: Vec<String> = orders
            .values()
            .filter(|o| o.is_pending())
            .map(|o| o.id.clone())
            .collect();
        ids.sort();
        ids
    }
}
