//! # Application State
//!
//! Shared state for the Axum application: the reconciliation engine, the
//! inventory and the storefront configuration.

use crate::telegram::{TelegramConfig, TelegramNotifier};
use anyhow::Context;
use shop_core::{
    BoxedPaymentGateway, CatalogSeed, InMemoryCatalog, InMemoryOrderLedger, InMemoryStockPool,
    Inventory, LoggingSink, NotificationSink, Reconciler, ReconcilerConfig,
};
use shop_pakasir::PakasirGateway;
use std::net::SocketAddr;
use std::sync::Arc;

/// Storefront contact links shown by the frontend
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Contacts {
    pub wa: Option<String>,
    pub tg: Option<String>,
    pub ch: Option<String>,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    pub shop_name: String,
    pub contacts: Contacts,
    /// Explicit catalog seed file; otherwise `config/catalog.toml` is searched
    pub catalog_path: Option<String>,
    pub low_stock_threshold: usize,
    /// Bearer token for the admin endpoints
    pub admin_token: Option<String>,
    /// Emit JSON log lines
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            environment: "development".to_string(),
            shop_name: "DigiShop".to_string(),
            contacts: Contacts::default(),
            catalog_path: None,
            low_stock_threshold: shop_core::reconcile::DEFAULT_LOW_STOCK_THRESHOLD,
            admin_token: None,
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let port = match optional("PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PORT must be a port number, got '{}'", raw))?,
            None => defaults.port,
        };
        let low_stock_threshold = match optional("LOW_STOCK_THRESHOLD") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("LOW_STOCK_THRESHOLD must be a number, got '{}'", raw))?,
            None => defaults.low_stock_threshold,
        };

        Ok(Self {
            host: optional("HOST").unwrap_or(defaults.host),
            port,
            environment: optional("ENVIRONMENT").unwrap_or(defaults.environment),
            shop_name: optional("SHOP_NAME").unwrap_or(defaults.shop_name),
            contacts: Contacts {
                wa: optional("CONTACT_WA"),
                tg: optional("CONTACT_TG"),
                ch: optional("CONTACT_CH"),
            },
            catalog_path: optional("CATALOG_PATH"),
            low_stock_threshold,
            admin_token: optional("ADMIN_TOKEN"),
            log_json: optional("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Reconciler>,
    pub inventory: Arc<Inventory>,
    pub config: AppConfig,
    /// Pakasir project slug; webhooks for other projects are dropped
    pub webhook_project: Option<String>,
}

impl AppState {
    /// Wire the in-memory stores, the Pakasir gateway and the notification sink
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let gateway = PakasirGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Pakasir: {}", e))?;
        let project = gateway.config().project.clone();

        let sink: Arc<dyn NotificationSink> = match TelegramConfig::from_env() {
            Some(telegram) => {
                tracing::info!("Telegram notifications enabled");
                Arc::new(TelegramNotifier::new(telegram)?)
            }
            None => {
                tracing::warn!("TELEGRAM_BOT_TOKEN not set, notifications go to the log only");
                Arc::new(LoggingSink)
            }
        };

        let catalog = Arc::new(InMemoryCatalog::new());
        let stock = Arc::new(InMemoryStockPool::new());
        let inventory = Inventory::new(catalog.clone(), stock.clone())
            .with_low_stock_threshold(config.low_stock_threshold);

        if let Some(seed) = load_catalog_seed(config.catalog_path.as_deref())? {
            let loaded = inventory.seed(seed).await?;
            tracing::info!("Seeded {} products", loaded);
        }

        let engine = Reconciler::new(
            catalog,
            stock,
            Arc::new(InMemoryOrderLedger::new()),
            Arc::new(gateway) as BoxedPaymentGateway,
            sink,
        )
        .with_config(ReconcilerConfig {
            low_stock_threshold: config.low_stock_threshold,
        });

        Ok(Self::with_parts(config, engine, inventory, Some(project)))
    }

    /// Assemble state from prebuilt parts
    pub fn with_parts(
        config: AppConfig,
        engine: Reconciler,
        inventory: Inventory,
        webhook_project: Option<String>,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            inventory: Arc::new(inventory),
            config,
            webhook_project,
        }
    }
}

/// Load the catalog seed file, if one exists
fn load_catalog_seed(explicit: Option<&str>) -> anyhow::Result<Option<CatalogSeed>> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path))?;
        let seed = CatalogSeed::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
        return Ok(Some(seed));
    }

    let config_paths = [
        "config/catalog.toml",
        "../config/catalog.toml",
        "../../config/catalog.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let seed = CatalogSeed::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            tracing::info!("Loaded {} products from {}", seed.products.len(), path);
            return Ok(Some(seed));
        }
    }

    tracing::warn!("No catalog seed found, starting with an empty catalog");
    Ok(None)
}
