//! # DigiShop
//!
//! Digital goods storefront with QRIS payments.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export PAKASIR_SLUG=digishop
//! export PAKASIR_API_KEY=...
//! export TELEGRAM_BOT_TOKEN=...   # optional
//! export TELEGRAM_ADMIN_ID=...    # optional
//!
//! # Run the server
//! digishop
//! ```

use shop_api::{routes, state::AppState, AppConfig};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    if config.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    // Print banner
    print_banner(&config.shop_name);

    // Initialize application state
    let addr = config.socket_addr()?;
    let is_prod = config.is_production();
    let state = AppState::new(config).await?;

    info!("Environment: {}", state.config.environment);
    info!("Products loaded: {}", state.inventory.listing().await.len());
    info!("Payment provider: {}", state.engine.gateway().provider_name());

    // Create router
    let engine = state.engine.clone();
    let app = routes::create_router(state);

    // Start server
    info!("🚀 DigiShop starting on http://{}", addr);

    if !is_prod {
        info!("📝 Health: http://{}/health", addr);
        info!("🛒 Order: POST http://{}/api/order", addr);
        info!("🔔 Webhook: POST http://{}/api/webhook/pakasir", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("🛑 Shutdown signal received");
        })
        .await?;

    // Deliver notifications queued by the last requests
    engine.flush_notifications().await;
    info!("👋 DigiShop stopped");

    Ok(())
}

fn print_banner(shop_name: &str) {
    println!(
        r#"
  🛍  {} 🛍
  ━━━━━━━━━━━━━━━━━━━━━━━
  Digital goods storefront
  Version: {}

"#,
        shop_name,
        env!("CARGO_PKG_VERSION")
    );
}
