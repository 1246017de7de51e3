//! # shop-core
//!
//! Core types and traits for the DigiShop order and stock reconciliation engine.
//!
//! This crate provides:
//! - `PaymentGateway` trait for implementing QR payment providers
//! - `Catalog`, `StockPool` and `OrderLedger` store traits with in-memory implementations
//! - `Reconciler`, which turns settled payments into fulfilled orders exactly once
//! - `Inventory` for operator-side product and stock administration
//! - `NotificationSink` and typed `ShopEvent`s
//! - `ShopError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{NewOrder, Reconciler, WebhookNotice};
//!
//! let engine = Reconciler::new(catalog, stock, ledger, gateway, sink);
//!
//! // Buyer places an order and receives a QR payload
//! let order = engine.create_order(NewOrder {
//!     buyer_name: "Budi".into(),
//!     product_id: "nflx".into(),
//!     notify_target: None,
//! }).await?;
//!
//! // Either trigger completes it, exactly once
//! engine.check(&order.id).await?;
//! engine.handle_webhook(WebhookNotice {
//!     order_id: order.id.clone(),
//!     status: "completed".into(),
//!     amount: Some(order.amount()),
//! }).await?;
//! ```

pub mod catalog;
pub mod error;
pub mod gateway;
pub mod inventory;
pub mod ledger;
pub mod mock;
pub mod notify;
pub mod order;
pub mod product;
pub mod reconcile;
pub mod stock;

// Re-exports for convenience
pub use catalog::{Catalog, InMemoryCatalog};
pub use error::{ShopError, ShopResult};
pub use gateway::{BoxedPaymentGateway, PaymentGateway, PaymentRequest, SettlementStatus};
pub use inventory::{
    BulkAddReport, Inventory, ListedProduct, ProductDraft, StockLevel, StockSummary,
};
pub use ledger::{InMemoryOrderLedger, OrderLedger};
pub use notify::{LoggingSink, NotificationQueue, NotificationSink, ShopEvent};
pub use order::{
    Fulfillment, Order, OrderIdGenerator, OrderStatus, OrderTransition, OrderView,
    ProductSnapshot,
};
pub use product::{format_rupiah, CatalogSeed, DurationUnit, Product, ProductField, SeedProduct};
pub use reconcile::{
    ConfirmOutcome, NewOrder, Reconciler, ReconcilerConfig, SweepReport, WebhookNotice,
    WebhookOutcome,
};
pub use stock::{InMemoryStockPool, StockPool, StockStats, StockUnit};
