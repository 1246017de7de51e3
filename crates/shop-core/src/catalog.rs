//! # Catalog
//!
//! Read-only product lookup consumed by the reconciliation engine, plus an
//! in-memory implementation with the admin mutations the inventory needs.

use crate::error::{ShopError, ShopResult};
use crate::product::{Product, ProductField};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Product lookup. Returned products are value snapshots.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get(&self, product_id: &str) -> Option<Product>;

    async fn list(&self) -> Vec<Product>;
}

/// A thread-safe in-memory catalog keyed by product id.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<BTreeMap<String, Product>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product after validating it
    pub async fn upsert(&self, product: Product) -> ShopResult<()> {
        product.validate()?;
        self.products
            .write()
            .await
            .insert(product.id.clone(), product);
        Ok(())
    }

    /// Edit a single field. Orders keep their own snapshot, so this never
    /// changes historical orders.
    pub async fn edit(&self, product_id: &str, field: ProductField, value: &str) -> ShopResult<Product> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| ShopError::ProductNotFound {
                product_id: product_id.to_string(),
            })?;

        let mut edited = product.clone();
        let value = value.trim();
        match field {
            ProductField::Name => edited.name = value.to_string(),
            ProductField::Description => edited.description = value.to_string(),
            ProductField::Emoji => edited.emoji = Some(value.to_string()),
            ProductField::Price => edited.price = parse_positive(value, "price")?,
            ProductField::Duration => {
                edited.duration = u32::try_from(parse_positive(value, "duration")?)
                    .map_err(|_| ShopError::Validation("duration is too large".into()))?
            }
        }
        edited.validate()?;
        *product = edited.clone();
        Ok(edited)
    }

    pub async fn remove(&self, product_id: &str) -> Option<Product> {
        self.products.write().await.remove(product_id)
    }

    pub async fn len(&self) -> usize {
        self.products.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.products.read().await.is_empty()
    }
}

fn parse_positive(value: &str, field: &str) -> ShopResult<u64> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ShopError::Validation(format!("{} must be a positive number", field))),
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get(&self, product_id: &str) -> Option<Product> {
        self.products.read().await.get(product_id).cloned()
    }

    async fn list(&self) -> Vec<Product> {
        self.products.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::DurationUnit;

    fn netflix() -> Product {
        Product::new("nflx", "Netflix Premium", 15000, 1, DurationUnit::Month)
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert(netflix()).await.unwrap();

        let product = catalog.get("nflx").await.unwrap();
        assert_eq!(product.price, 15000);
        assert!(catalog.get("missing").await.is_none());
        assert_eq!(catalog.len().await, 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_invalid_product() {
        let catalog = InMemoryCatalog::new();
        let err = catalog
            .upsert(Product::new("x", "Broken", 0, 1, DurationUnit::Day))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Validation(_)));
        assert!(catalog.is_empty().await);
    }

    #[tokio::test]
    async fn test_edit_fields() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert(netflix()).await.unwrap();

        let edited = catalog.edit("nflx", ProductField::Price, "25000").await.unwrap();
        assert_eq!(edited.price, 25000);

        let edited = catalog.edit("nflx", ProductField::Emoji, " 🎬 ").await.unwrap();
        assert_eq!(edited.emoji.as_deref(), Some("🎬"));

        assert_eq!(catalog.get("nflx").await.unwrap().price, 25000);
    }

    #[tokio::test]
    async fn test_edit_rejects_bad_numbers() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert(netflix()).await.unwrap();

        assert!(catalog.edit("nflx", ProductField::Price, "abc").await.is_err());
        assert!(catalog.edit("nflx", ProductField::Duration, "0").await.is_err());
        assert_eq!(catalog.get("nflx").await.unwrap().price, 15000);

        let missing = catalog.edit("nope", ProductField::Name, "x").await.unwrap_err();
        assert!(matches!(missing, ShopError::ProductNotFound { .. }));
    }
}
