//! # Inventory Administration
//!
//! Operator-side mutations over the catalog and the stock pools, plus the
//! read models the storefront and the admin endpoints render.

use crate::catalog::{Catalog, InMemoryCatalog};
use crate::error::{ShopError, ShopResult};
use crate::product::{CatalogSeed, DurationUnit, Product, ProductField};
use crate::reconcile::DEFAULT_LOW_STOCK_THRESHOLD;
use crate::stock::StockPool;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Fields for a new product. The id is generated when absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub emoji: Option<String>,
    pub price: u64,
    pub duration: u32,
    #[serde(alias = "durationType")]
    pub duration_unit: DurationUnit,
}

impl ProductDraft {
    pub fn new(name: impl Into<String>, price: u64, duration: u32, duration_unit: DurationUnit) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            emoji: None,
            price,
            duration,
            duration_unit,
        }
    }

    fn into_product(self) -> Product {
        let id = self
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(Product::generate_id);
        let mut product = Product::new(id, self.name.trim(), self.price, self.duration, self.duration_unit)
            .with_description(self.description.trim());
        product.emoji = self.emoji.filter(|e| !e.trim().is_empty());
        product
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StockLevel {
    Empty,
    Low,
    Ok,
}

/// Per-product stock figures for the admin view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSummary {
    pub product_id: String,
    pub name: String,
    pub available: usize,
    pub sold: usize,
    pub level: StockLevel,
}

/// Storefront product entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedProduct {
    pub id: String,
    pub name: String,
    pub description: String,
    pub emoji: Option<String>,
    pub price: u64,
    pub price_display: String,
    pub duration: u32,
    pub duration_type: DurationUnit,
    pub stock: usize,
}

/// Result of a bulk stock upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkAddReport {
    pub added: usize,
    pub skipped: usize,
}

pub struct Inventory {
    catalog: Arc<InMemoryCatalog>,
    stock: Arc<dyn StockPool>,
    low_stock_threshold: usize,
}

impl Inventory {
    pub fn new(catalog: Arc<InMemoryCatalog>, stock: Arc<dyn StockPool>) -> Self {
        Self {
            catalog,
            stock,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }

    /// Builder: set the level at which stock is reported as low
    pub fn with_low_stock_threshold(mut self, threshold: usize) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    pub fn catalog(&self) -> &Arc<InMemoryCatalog> {
        &self.catalog
    }

    pub async fn add_product(&self, draft: ProductDraft) -> ShopResult<Product> {
        let product = draft.into_product();
        if self.catalog.get(&product.id).await.is_some() {
            return Err(ShopError::Validation(format!(
                "product id '{}' already exists",
                product.id
            )));
        }
        self.catalog.upsert(product.clone()).await?;
        info!(product_id = %product.id, name = %product.name, "product added");
        Ok(product)
    }

    pub async fn edit_product(&self, product_id: &str, field: ProductField, value: &str) -> ShopResult<Product> {
        let product = self.catalog.edit(product_id, field, value).await?;
        info!(product_id, ?field, "product edited");
        Ok(product)
    }

    /// Remove a product together with its stock pool
    pub async fn delete_product(&self, product_id: &str) -> ShopResult<Product> {
        let product = self
            .catalog
            .remove(product_id)
            .await
            .ok_or_else(|| ShopError::ProductNotFound {
                product_id: product_id.to_string(),
            })?;
        let units = self.stock.remove_pool(product_id).await;
        info!(product_id, units, "product deleted");
        Ok(product)
    }

    pub async fn add_stock(&self, product_id: &str, credential: &str) -> ShopResult<usize> {
        self.ensure_product(product_id).await?;
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(ShopError::Validation("credential must not be empty".into()));
        }
        self.stock
            .add_units(product_id, vec![credential.to_string()])
            .await;
        Ok(self.stock.count_free(product_id).await)
    }

    /// One credential per line; blank lines are skipped.
    pub async fn bulk_add_stock(&self, product_id: &str, text: &str) -> ShopResult<BulkAddReport> {
        self.ensure_product(product_id).await?;
        let lines: Vec<String> = text.lines().map(String::from).collect();
        let added = self.stock.add_units(product_id, lines.clone()).await;
        if added == 0 {
            return Err(ShopError::Validation("no credentials in input".into()));
        }
        info!(product_id, added, "stock added");
        Ok(BulkAddReport {
            added,
            skipped: lines.len() - added,
        })
    }

    pub async fn stock_stats(&self) -> Vec<StockSummary> {
        let mut summaries = Vec::new();
        for product in self.catalog.list().await {
            let stats = self.stock.stats(&product.id).await;
            let level = match stats.available {
                0 => StockLevel::Empty,
                n if n <= self.low_stock_threshold => StockLevel::Low,
                _ => StockLevel::Ok,
            };
            summaries.push(StockSummary {
                product_id: product.id,
                name: product.name,
                available: stats.available,
                sold: stats.sold,
                level,
            });
        }
        summaries
    }

    pub async fn listing(&self) -> Vec<ListedProduct> {
        let mut listed = Vec::new();
        for product in self.catalog.list().await {
            let stock = self.stock.count_free(&product.id).await;
            listed.push(ListedProduct {
                price_display: product.display_price(),
                id: product.id,
                name: product.name,
                description: product.description,
                emoji: product.emoji,
                price: product.price,
                duration: product.duration,
                duration_type: product.duration_unit,
                stock,
            });
        }
        listed
    }

    /// Load products and their credentials from a seed file
    pub async fn seed(&self, seed: CatalogSeed) -> ShopResult<usize> {
        let mut loaded = 0;
        for entry in seed.products {
            let product = entry.to_product();
            self.catalog.upsert(product.clone()).await?;
            let units = self.stock.add_units(&product.id, entry.stock).await;
            info!(product_id = %product.id, units, "seeded product");
            loaded += 1;
        }
        Ok(loaded)
    }

    async fn ensure_product(&self, product_id: &str) -> ShopResult<()> {
        match self.catalog.get(product_id).await {
            Some(_) => Ok(()),
            None => Err(ShopError::ProductNotFound {
                product_id: product_id.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inventory")
            .field("low_stock_threshold", &self.low_stock_threshold)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::InMemoryStockPool;
    use chrono::Utc;

    fn inventory() -> (Inventory, Arc<InMemoryStockPool>) {
        let stock = Arc::new(InMemoryStockPool::new());
        let inventory = Inventory::new(Arc::new(InMemoryCatalog::new()), stock.clone());
        (inventory, stock)
    }

    #[tokio::test]
    async fn test_add_product_generates_id() {
        let (inv, _) = inventory();
        let product = inv
            .add_product(ProductDraft::new(" Spotify Family ", 20000, 1, DurationUnit::Month))
            .await
            .unwrap();

        assert_eq!(product.id.len(), 8);
        assert_eq!(product.name, "Spotify Family");
        assert!(inv.catalog().get(&product.id).await.is_some());
    }

    #[tokio::test]
    async fn test_add_product_validates() {
        let (inv, _) = inventory();
        let err = inv
            .add_product(ProductDraft::new("Free", 0, 1, DurationUnit::Month))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Validation(_)));

        let mut draft = ProductDraft::new("Canva", 10000, 30, DurationUnit::Day);
        draft.id = Some("canva".into());
        inv.add_product(draft.clone()).await.unwrap();
        assert!(inv.add_product(draft).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_stock() {
        let (inv, stock) = inventory();
        let mut draft = ProductDraft::new("Canva", 10000, 30, DurationUnit::Day);
        draft.id = Some("canva".into());
        inv.add_product(draft).await.unwrap();
        inv.bulk_add_stock("canva", "a:1\nb:2").await.unwrap();

        inv.delete_product("canva").await.unwrap();
        assert!(stock.units("canva").await.is_empty());
        assert!(matches!(
            inv.delete_product("canva").await,
            Err(ShopError::ProductNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_bulk_add_stock() {
        let (inv, _) = inventory();
        let mut draft = ProductDraft::new("Canva", 10000, 30, DurationUnit::Day);
        draft.id = Some("canva".into());
        inv.add_product(draft).await.unwrap();

        let report = inv
            .bulk_add_stock("canva", "a@mail.com:1\n\n  b@mail.com:2  \n   \n")
            .await
            .unwrap();
        assert_eq!(report, BulkAddReport { added: 2, skipped: 2 });

        assert!(matches!(
            inv.bulk_add_stock("canva", "\n \n").await,
            Err(ShopError::Validation(_))
        ));
        assert!(matches!(
            inv.bulk_add_stock("nope", "x").await,
            Err(ShopError::ProductNotFound { .. })
        ));
        assert_eq!(inv.add_stock("canva", " c@mail.com:3 ").await.unwrap(), 3);
        assert!(inv.add_stock("canva", "   ").await.is_err());
    }

    #[tokio::test]
    async fn test_stock_levels() {
        let (inv, stock) = inventory();
        for (id, units) in [("empty", 0), ("low", 3), ("ok", 4)] {
            let mut draft = ProductDraft::new(id, 10000, 1, DurationUnit::Month);
            draft.id = Some(id.into());
            inv.add_product(draft).await.unwrap();
            stock
                .add_units(id, (0..units).map(|i| format!("{}:{}", id, i)).collect())
                .await;
        }
        stock.claim_one("ok", "DS-1", Utc::now()).await.unwrap();

        let stats = inv.stock_stats().await;
        let levels: Vec<_> = stats.iter().map(|s| (s.product_id.as_str(), s.level)).collect();
        assert_eq!(
            levels,
            vec![
                ("empty", StockLevel::Empty),
                ("low", StockLevel::Low),
                ("ok", StockLevel::Low)
            ]
        );
        let ok = stats.iter().find(|s| s.product_id == "ok").unwrap();
        assert_eq!((ok.available, ok.sold), (3, 1));
    }

    #[tokio::test]
    async fn test_seed_and_listing() {
        let (inv, _) = inventory();
        let seed = CatalogSeed::from_toml(
            r#"
            [[products]]
            id = "nflx"
            name = "Netflix Premium"
            emoji = "🎬"
            price = 15000
            duration = 1
            duration_unit = "bulan"
            stock = ["a@mail.com:1", "b@mail.com:2"]
            "#,
        )
        .unwrap();
        assert_eq!(inv.seed(seed).await.unwrap(), 1);

        let listing = inv.listing().await;
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].stock, 2);
        assert_eq!(listing[0].price_display, "Rp 15.000");
        assert_eq!(listing[0].duration_type, DurationUnit::Month);
    }
}
