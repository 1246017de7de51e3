//! # shop-api
//!
//! HTTP API layer for the DigiShop storefront.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for ordering, status polling and cancellation
//! - Pakasir webhook handler
//! - Admin endpoints for stock and catalog management
//! - Telegram notification sink
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/config` | Storefront config and products |
//! | POST | `/api/order` | Create order |
//! | GET | `/api/check/{id}` | Poll order status |
//! | GET | `/api/order/{id}` | Order history lookup |
//! | POST | `/api/cancel` | Cancel pending order |
//! | POST | `/api/webhook/pakasir` | Pakasir webhook |
//! | GET | `/api/admin/stock` | Stock statistics |
//! | POST | `/api/admin/stock/{id}` | Add one credential |
//! | POST | `/api/admin/stock/{id}/bulk` | Add credentials, one per line |
//! | POST | `/api/admin/products` | Add product |
//! | PATCH | `/api/admin/products/{id}` | Edit one product field |
//! | DELETE | `/api/admin/products/{id}` | Delete product and its stock |
//! | GET | `/api/admin/orders` | Recent orders |
//! | POST | `/api/admin/sweep` | Re-check pending orders |

pub mod handlers;
pub mod routes;
pub mod state;
pub mod telegram;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
pub use telegram::{TelegramConfig, TelegramNotifier};
