//! # shop-pakasir
//!
//! Pakasir QRIS payment gateway for DigiShop.
//!
//! - **PakasirGateway** - `PaymentGateway` over the Pakasir transaction API
//!   (create, detail, cancel), each call bounded by a timeout
//! - **PakasirWebhook** - parser for the settlement notices Pakasir posts back
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop_pakasir::PakasirGateway;
//! use shop_core::PaymentGateway;
//!
//! // Create gateway from environment
//! let gateway = PakasirGateway::from_env()?;
//!
//! // Create a QRIS request; render `payload` as a QR code
//! let request = gateway.create_payment_request("DS-1735689600000-000001", 15000).await?;
//! ```
//!
//! ## Webhook Handling
//!
//! ```rust,ignore
//! use shop_pakasir::PakasirWebhook;
//!
//! // In your webhook endpoint:
//! let notice = PakasirWebhook::parse(&body)?.into_notice();
//! engine.handle_webhook(notice).await?;
//! ```

pub mod client;
pub mod config;
pub mod webhook;

// Re-exports
pub use client::PakasirGateway;
pub use config::PakasirConfig;
pub use webhook::PakasirWebhook;
