//! # Routes
//!
//! Axum router configuration for the storefront API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Storefront:
///   - GET  /api/config - Products with free stock, shop name, contacts
///   - POST /api/order - Create order, returns the order id
///   - GET  /api/check/{order_id} - Poll status (confirms settled payments)
///   - GET  /api/order/{order_id} - History lookup
///   - POST /api/cancel - Cancel a pending order
///
/// - Webhooks:
///   - POST /api/webhook/pakasir - Pakasir settlement notice
///
/// - Admin (bearer token):
///   - GET    /api/admin/stock
///   - POST   /api/admin/stock/{product_id} - Add one credential
///   - POST   /api/admin/stock/{product_id}/bulk - Add credentials, one per line
///   - POST   /api/admin/products
///   - PATCH  /api/admin/products/{product_id} - Edit one field
///   - DELETE /api/admin/products/{product_id} - Delete product and its stock
///   - GET    /api/admin/orders
///   - POST   /api/admin/sweep
pub fn create_router(state: AppState) -> Router {
    // The storefront is served from arbitrary static hosts
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let storefront_routes = Router::new()
        .route("/config", get(handlers::shop_config))
        .route("/order", post(handlers::create_order))
        .route("/order/{order_id}", get(handlers::get_order))
        .route("/check/{order_id}", get(handlers::check_order))
        .route("/cancel", post(handlers::cancel_order));

    let webhook_routes = Router::new().route("/pakasir", post(handlers::pakasir_webhook));

    let admin_routes = Router::new()
        .route("/stock", get(handlers::admin_stock))
        .route("/stock/{product_id}", post(handlers::admin_add_stock))
        .route("/stock/{product_id}/bulk", post(handlers::admin_bulk_stock))
        .route("/products", post(handlers::admin_add_product))
        .route(
            "/products/{product_id}",
            patch(handlers::admin_edit_product).delete(handlers::admin_delete_product),
        )
        .route("/orders", get(handlers::admin_orders))
        .route("/sweep", post(handlers::admin_sweep));

    let api_routes = Router::new()
        .merge(storefront_routes)
        .nest("/webhook", webhook_routes)
        .nest("/admin", admin_routes);

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
