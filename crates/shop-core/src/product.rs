//! # Product Types
//!
//! Product catalog types for the storefront.
//! Products can be seeded from `config/catalog.toml`.

use crate::error::{ShopError, ShopResult};
use chrono::{DateTime, Days, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unit of a product's access duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    #[serde(alias = "hari")]
    Day,
    #[serde(alias = "bulan")]
    Month,
    #[serde(alias = "tahun")]
    Year,
}

impl DurationUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::Day => "day",
            DurationUnit::Month => "month",
            DurationUnit::Year => "year",
        }
    }

    /// Add `amount` of this unit to `from`, calendar-aware.
    ///
    /// Month and year arithmetic clamps to the last day of the target month:
    /// Jan 31 + 1 month is Feb 28 (Feb 29 in leap years), and Feb 29 + 1 year
    /// is Feb 28. Returns `None` on overflow.
    pub fn add_to(&self, from: DateTime<Utc>, amount: u32) -> Option<DateTime<Utc>> {
        match self {
            DurationUnit::Day => from.checked_add_days(Days::new(u64::from(amount))),
            DurationUnit::Month => from.checked_add_months(Months::new(amount)),
            DurationUnit::Year => amount
                .checked_mul(12)
                .and_then(|months| from.checked_add_months(Months::new(months))),
        }
    }
}

impl std::str::FromStr for DurationUnit {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "days" | "hari" => Ok(DurationUnit::Day),
            "month" | "months" | "bulan" => Ok(DurationUnit::Month),
            "year" | "years" | "tahun" => Ok(DurationUnit::Year),
            other => Err(ShopError::Validation(format!(
                "unknown duration unit '{}' (expected day, month or year)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format an amount in rupiah with dot thousands separators ("Rp 15.000")
pub fn format_rupiah(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("Rp {}", grouped)
}

/// A product in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier (e.g., "a1b2c3d4")
    pub id: String,

    /// Display name
    pub name: String,

    /// Short description
    #[serde(default)]
    pub description: String,

    /// Display emoji
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,

    /// Price in the smallest currency unit
    pub price: u64,

    /// Access duration, counted in `duration_unit`
    pub duration: u32,

    pub duration_unit: DurationUnit,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: u64,
        duration: u32,
        duration_unit: DurationUnit,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            emoji: None,
            price,
            duration,
            duration_unit,
            created_at: Utc::now(),
        }
    }

    /// Generate a short random product id
    pub fn generate_id() -> String {
        Uuid::new_v4().simple().to_string()[..8].to_string()
    }

    /// Builder: set description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Builder: set emoji
    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }

    /// Check the fields an order depends on
    pub fn validate(&self) -> ShopResult<()> {
        if self.id.trim().is_empty() {
            return Err(ShopError::Validation("product id must not be empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(ShopError::Validation("product name must not be empty".into()));
        }
        if self.price == 0 {
            return Err(ShopError::Validation("price must be positive".into()));
        }
        if self.duration == 0 {
            return Err(ShopError::Validation("duration must be positive".into()));
        }
        Ok(())
    }

    /// Price for display (e.g., "Rp 15.000")
    pub fn display_price(&self) -> String {
        format_rupiah(self.price)
    }
}

/// Editable product fields for the admin path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductField {
    Name,
    Price,
    Duration,
    Description,
    Emoji,
}

impl std::str::FromStr for ProductField {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(ProductField::Name),
            "price" => Ok(ProductField::Price),
            "duration" => Ok(ProductField::Duration),
            "description" => Ok(ProductField::Description),
            "emoji" => Ok(ProductField::Emoji),
            other => Err(ShopError::Validation(format!(
                "invalid field '{}', use: name, price, duration, description, emoji",
                other
            ))),
        }
    }
}

/// One `[[products]]` entry in a catalog seed file
#[derive(Debug, Clone, Deserialize)]
pub struct SeedProduct {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub emoji: Option<String>,
    pub price: u64,
    pub duration: u32,
    pub duration_unit: DurationUnit,
    /// Credentials to load into the product's stock pool
    #[serde(default)]
    pub stock: Vec<String>,
}

impl SeedProduct {
    pub fn to_product(&self) -> Product {
        let id = self.id.clone().unwrap_or_else(Product::generate_id);
        let mut product = Product::new(id, &self.name, self.price, self.duration, self.duration_unit)
            .with_description(&self.description);
        product.emoji = self.emoji.clone();
        product
    }
}

/// Catalog seed (loaded from config)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

impl CatalogSeed {
    /// Load seed from TOML string
    pub fn from_toml(toml_str: &str) -> ShopResult<Self> {
        toml::from_str(toml_str).map_err(|e| ShopError::Configuration(e.to_string()))
    }
}
