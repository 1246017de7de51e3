//! # Stock Pool
//!
//! Per-product pools of single-use credentials.
//!
//! `claim_one` is the only operation that consumes a unit. It selects the
//! oldest free unit and binds it to an order under one write lock, so two
//! concurrent claims can never receive the same unit.

use crate::error::{ShopError, ShopResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Binding of a consumed unit to the order that received it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockClaim {
    pub order_id: String,
    pub used_at: DateTime<Utc>,
}

/// One consumable credential instance.
///
/// `used`, `used_at` and `order_id` are a single `Option<StockClaim>`: a unit
/// is either free or fully claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUnit {
    pub id: String,
    /// Opaque credential, usually `email:password` or a bare email
    pub credential: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<StockClaim>,
}

impl StockUnit {
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            credential: credential.into(),
            claim: None,
        }
    }

    pub fn is_used(&self) -> bool {
        self.claim.is_some()
    }

    pub fn order_id(&self) -> Option<&str> {
        self.claim.as_ref().map(|c| c.order_id.as_str())
    }
}

/// Available/sold counts for one product
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StockStats {
    pub available: usize,
    pub sold: usize,
}

#[async_trait]
pub trait StockPool: Send + Sync {
    /// Number of unconsumed units
    async fn count_free(&self, product_id: &str) -> usize;

    /// Atomically take the oldest free unit and bind it to `order_id`.
    ///
    /// Fails with `ShopError::OutOfStock` when no unit is free (including when
    /// the product has no pool at all).
    async fn claim_one(
        &self,
        product_id: &str,
        order_id: &str,
        at: DateTime<Utc>,
    ) -> ShopResult<StockUnit>;

    /// Append credentials; blank lines are skipped. Returns how many were added.
    async fn add_units(&self, product_id: &str, credentials: Vec<String>) -> usize;

    /// Drop a product's whole pool. Returns the number of units removed.
    async fn remove_pool(&self, product_id: &str) -> usize;

    async fn units(&self, product_id: &str) -> Vec<StockUnit>;

    /// Return a claimed unit to the pool, but only while it is still bound to
    /// `order_id`. Returns whether the unit was freed.
    async fn release(&self, product_id: &str, unit_id: &str, order_id: &str) -> bool;

    async fn stats(&self, product_id: &str) -> StockStats;
}

/// A thread-safe in-memory stock pool.
///
/// Uses `RwLock<HashMap<product_id, Vec<StockUnit>>>`; insertion order is the
/// claim order.
#[derive(Debug, Default)]
pub struct InMemoryStockPool {
    pools: RwLock<HashMap<String, Vec<StockUnit>>>,
}

impl InMemoryStockPool {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockPool for InMemoryStockPool {
    async fn count_free(&self, product_id: &str) -> usize {
        self.pools
            .read()
            .await
            .get(product_id)
            .map(|units| units.iter().filter(|u| !u.is_used()).count())
            .unwrap_or(0)
    }

    async fn claim_one(
        &self,
        product_id: &str,
        order_id: &str,
        at: DateTime<Utc>,
    ) -> ShopResult<StockUnit> {
        let mut pools = self.pools.write().await;
        let unit = pools
            .get_mut(product_id)
            .and_then(|units| units.iter_mut().find(|u| !u.is_used()))
            .ok_or_else(|| ShopError::OutOfStock {
                product_id: product_id.to_string(),
            })?;

        unit.claim = Some(StockClaim {
            order_id: order_id.to_string(),
            used_at: at,
        });
        Ok(unit.clone())
    }

    async fn add_units(&self, product_id: &str, credentials: Vec<String>) -> usize {
        let mut pools = self.pools.write().await;
        let units = pools.entry(product_id.to_string()).or_default();
        let before = units.len();
        units.extend(
            credentials
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(StockUnit::new),
        );
        units.len() - before
    }

    async fn remove_pool(&self, product_id: &str) -> usize {
        self.pools
            .write()
            .await
            .remove(product_id)
            .map(|units| units.len())
            .unwrap_or(0)
    }

    async fn units(&self, product_id: &str) -> Vec<StockUnit> {
        self.pools
            .read()
            .await
            .get(product_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn release(&self, product_id: &str, unit_id: &str, order_id: &str) -> bool {
        let mut pools = self.pools.write().await;
        let Some(unit) = pools
            .get_mut(product_id)
            .and_then(|units| units.iter_mut().find(|u| u.id == unit_id))
        else {
            return false;
        };
        if unit.order_id() != Some(order_id) {
            return false;
        }
        unit.claim = None;
        true
    }

    async fn stats(&self, product_id: &str) -> StockStats {
        let pools = self.pools.read().await;
        let Some(units) = pools.get(product_id) else {
            return StockStats::default();
        };
        let sold = units.iter().filter(|u| u.is_used()).count();
        StockStats {
            available: units.len() - sold,
            sold,
        }
    }
}
