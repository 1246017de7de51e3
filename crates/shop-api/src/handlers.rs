//! # Request Handlers
//!
//! Axum request handlers for the storefront API.
//! Responses follow the `{ success, ... }` envelope the storefront frontend reads.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shop_core::{
    ConfirmOutcome, ListedProduct, NewOrder, ProductDraft, ProductField, ShopError, WebhookOutcome,
};
use shop_pakasir::PakasirWebhook;
use std::collections::BTreeMap;
use tracing::{error, info, instrument, warn};

/// Orders returned by the admin order list
pub const ADMIN_RECENT_ORDERS: usize = 10;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Create order request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub buyer_name: String,
    #[serde(default)]
    pub product_id: String,
    /// Buyer's Telegram chat id, for credential delivery
    #[serde(default)]
    pub telegram_id: Option<TelegramId>,
}

/// Chat ids arrive as numbers or strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TelegramId {
    Number(i64),
    Text(String),
}

impl TelegramId {
    fn into_string(self) -> String {
        match self {
            TelegramId::Number(n) => n.to_string(),
            TelegramId::Text(s) => s,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub order_id: String,
}

/// Single field edit, e.g. `{ "field": "price", "value": "20000" }`
#[derive(Debug, Deserialize)]
pub struct EditProductRequest {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct AddStockRequest {
    pub credential: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub msg: String,
    pub code: u16,
    /// Whether the same request may succeed if sent again
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>, code: u16) -> Self {
        Self {
            success: false,
            msg: msg.into(),
            code,
            retryable: false,
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn shop_error_to_response(err: ShopError) -> ApiError {
    let code = err.status_code();
    let mut response = ErrorResponse::new(err.to_string(), code);
    response.retryable = err.is_retryable();
    (StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), Json(response))
}

/// Bearer-token guard for the admin endpoints. Without a configured token
/// the endpoints are open outside production and closed in production.
fn authorize_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.config.admin_token.as_deref() else {
        if state.config.is_production() {
            return Err((
                StatusCode::FORBIDDEN,
                Json(ErrorResponse::new("ADMIN_TOKEN is not configured", 403)),
            ));
        }
        return Ok(());
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if presented == Some(expected) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Unauthorized", 401)),
        ))
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "digishop",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Storefront configuration: products with free stock, shop name, contacts
pub async fn shop_config(State(state): State<AppState>) -> impl IntoResponse {
    let products: BTreeMap<String, ListedProduct> = state
        .inventory
        .listing()
        .await
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect();

    Json(json!({
        "products": products,
        "shopName": state.config.shop_name,
        "contacts": state.config.contacts,
    }))
}

/// Create an order and its QRIS payment request
#[instrument(skip(state, request), fields(product_id = %request.product_id))]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, ApiError> {
    let order = state
        .engine
        .create_order(NewOrder {
            buyer_name: request.buyer_name,
            product_id: request.product_id,
            notify_target: request.telegram_id.map(TelegramId::into_string),
        })
        .await
        .map_err(|e| {
            error!("Failed to create order: {}", e);
            shop_error_to_response(e)
        })?;

    Ok(Json(CreateOrderResponse {
        success: true,
        order_id: order.id,
    }))
}

/// Poll an order; confirms it when the gateway reports the payment settled
#[instrument(skip(state))]
pub async fn check_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .engine
        .check(&order_id)
        .await
        .map_err(shop_error_to_response)?;

    Ok(Json(match view {
        Some(view) => json!({ "success": true, "data": view }),
        None => json!({ "success": false, "status": "expired" }),
    }))
}

/// Order history lookup. Never triggers confirmation.
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.engine.view(&order_id).await.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("Order not found: {}", order_id), 404)),
        )
    })?;

    Ok(Json(json!({ "success": true, "data": view })))
}

#[instrument(skip(state, request), fields(order_id = %request.order_id))]
pub async fn cancel_order(
    State(state): State<AppState>,
    Json(request): Json<CancelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .engine
        .cancel(&request.order_id)
        .await
        .map_err(shop_error_to_response)?;

    Ok(Json(json!({ "success": true, "data": order.public_view(false) })))
}

/// Handle Pakasir webhook. Acknowledged once parsed, whatever the outcome.
#[instrument(skip(state, body))]
pub async fn pakasir_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let webhook = PakasirWebhook::parse(&body).map_err(|e| {
        warn!("Rejected webhook: {}", e);
        shop_error_to_response(e)
    })?;

    if let Some(project) = state.webhook_project.as_deref() {
        if !webhook.is_for_project(project) {
            warn!(
                order_id = %webhook.order_id,
                project = ?webhook.project,
                "Webhook for another project, ignoring"
            );
            return Ok(Json(json!({ "success": true })));
        }
    }

    let order_id = webhook.order_id.clone();
    match state.engine.handle_webhook(webhook.into_notice()).await {
        Ok(WebhookOutcome::Handled(ConfirmOutcome::Completed(_))) => {
            info!(order_id = %order_id, "Order completed from webhook");
        }
        Ok(WebhookOutcome::Handled(ConfirmOutcome::StockExhausted(_))) => {
            warn!(order_id = %order_id, "Webhook settled an order with no stock left");
        }
        Ok(_) => {}
        Err(e) => error!(order_id = %order_id, "Webhook handling failed: {}", e),
    }

    Ok(Json(json!({ "success": true })))
}

/// Stock statistics per product
pub async fn admin_stock(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    authorize_admin(&state, &headers)?;
    let stats = state.inventory.stock_stats().await;
    Ok(Json(json!({ "success": true, "data": stats })))
}

/// Most recent orders, newest first
pub async fn admin_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    authorize_admin(&state, &headers)?;
    let orders = state.engine.recent_orders(ADMIN_RECENT_ORDERS).await;
    Ok(Json(json!({ "success": true, "data": orders })))
}

/// Re-query the gateway for every pending order
pub async fn admin_sweep(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    authorize_admin(&state, &headers)?;
    let report = state
        .engine
        .sweep_pending()
        .await
        .map_err(shop_error_to_response)?;
    Ok(Json(json!({
        "success": true,
        "data": {
            "checked": report.checked,
            "completed": report.completed,
            "failed": report.failed,
        }
    })))
}

/// Add a product to the catalog
#[instrument(skip(state, headers, draft), fields(name = %draft.name))]
pub async fn admin_add_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(draft): Json<ProductDraft>,
) -> Result<impl IntoResponse, ApiError> {
    authorize_admin(&state, &headers)?;
    let product = state
        .inventory
        .add_product(draft)
        .await
        .map_err(shop_error_to_response)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": product })),
    ))
}

#[instrument(skip(state, headers, request), fields(field = %request.field))]
pub async fn admin_edit_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
    Json(request): Json<EditProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize_admin(&state, &headers)?;
    let field: ProductField = request.field.parse().map_err(shop_error_to_response)?;
    let product = state
        .inventory
        .edit_product(&product_id, field, &request.value)
        .await
        .map_err(shop_error_to_response)?;
    Ok(Json(json!({ "success": true, "data": product })))
}

/// Delete a product and its whole stock pool
#[instrument(skip(state, headers))]
pub async fn admin_delete_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize_admin(&state, &headers)?;
    let product = state
        .inventory
        .delete_product(&product_id)
        .await
        .map_err(shop_error_to_response)?;
    Ok(Json(json!({ "success": true, "data": product })))
}

/// Add one credential to a product's pool
#[instrument(skip(state, headers, request))]
pub async fn admin_add_stock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
    Json(request): Json<AddStockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize_admin(&state, &headers)?;
    let available = state
        .inventory
        .add_stock(&product_id, &request.credential)
        .await
        .map_err(shop_error_to_response)?;
    info!(product_id = %product_id, available, "stock added");
    Ok(Json(json!({
        "success": true,
        "data": { "productId": product_id, "available": available }
    })))
}

/// Add credentials from a plain-text body, one per line
#[instrument(skip(state, headers, body))]
pub async fn admin_bulk_stock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    authorize_admin(&state, &headers)?;
    let report = state
        .inventory
        .bulk_add_stock(&product_id, &body)
        .await
        .map_err(shop_error_to_response)?;
    Ok(Json(json!({
        "success": true,
        "data": { "productId": product_id, "added": report.added, "skipped": report.skipped }
    })))
}
