//! # Telegram Notifications
//!
//! `NotificationSink` that posts HTML messages through the Telegram Bot API.
//! Operator events go to the admin chat, credential deliveries go to the
//! buyer's chat.

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use reqwest::Client;
use serde::Serialize;
use shop_core::{format_rupiah, NotificationSink, ShopError, ShopEvent, ShopResult};
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Western Indonesia Time, used for message timestamps
const WIB_OFFSET_SECS: i32 = 7 * 3600;

#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Chat that receives operator events
    pub admin_chat_id: Option<String>,
    pub api_base_url: String,
}

impl TelegramConfig {
    /// `None` when `TELEGRAM_BOT_TOKEN` is unset
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())?;
        let admin_chat_id = std::env::var("TELEGRAM_ADMIN_ID")
            .ok()
            .filter(|t| !t.trim().is_empty());
        Some(Self::new(bot_token, admin_chat_id))
    }

    pub fn new(bot_token: impl Into<String>, admin_chat_id: Option<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            admin_chat_id,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"***")
            .field("admin_chat_id", &self.admin_chat_id)
            .finish()
    }
}

pub struct TelegramNotifier {
    config: TelegramConfig,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> ShopResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ShopError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    async fn send(&self, chat_id: &str, text: &str) -> ShopResult<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_base_url, self.config.bot_token
        );
        let response = self
            .client
            .post(&url)
            .json(&SendMessage {
                chat_id,
                text,
                parse_mode: "HTML",
            })
            .send()
            .await
            .map_err(|e| ShopError::Notification(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShopError::Notification(format!("HTTP {}: {}", status, body)));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    #[instrument(skip(self, event), fields(kind = event.kind()))]
    async fn notify(&self, event: ShopEvent) -> ShopResult<()> {
        let recipient = match &event {
            ShopEvent::CredentialDelivery { target, .. } => Some(target.as_str()),
            _ => self.config.admin_chat_id.as_deref(),
        };
        let Some(chat_id) = recipient else {
            debug!("no recipient configured, dropping event");
            return Ok(());
        };

        let text = render(&event, &now_wib());
        self.send(chat_id, &text).await
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

fn now_wib() -> String {
    match FixedOffset::east_opt(WIB_OFFSET_SECS) {
        Some(offset) => Utc::now()
            .with_timezone(&offset)
            .format("%d/%m/%Y %H.%M.%S")
            .to_string(),
        None => Utc::now().format("%d/%m/%Y %H.%M.%S UTC").to_string(),
    }
}

/// Escape text interpolated into an HTML-mode message
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Message body for an event
pub fn render(event: &ShopEvent, time: &str) -> String {
    match event {
        ShopEvent::NewOrder {
            order_id,
            buyer_name,
            product_name,
            duration,
            duration_unit,
            amount,
        } => format!(
            "🛒 <b>ORDER BARU</b>\n🆔 <code>{}</code>\n👤 {}\n📦 {}\n⏱ {} {}\n💰 {}\n🕐 {}",
            escape(order_id),
            escape(buyer_name),
            escape(product_name),
            duration,
            duration_unit,
            format_rupiah(*amount),
            time
        ),
        ShopEvent::Success {
            order_id,
            buyer_name,
            product_name,
            amount,
        } => format!(
            "✅ <b>PEMBAYARAN BERHASIL</b>\n🆔 <code>{}</code>\n👤 {}\n📦 {}\n💰 {}\n🕐 {}",
            escape(order_id),
            escape(buyer_name),
            escape(product_name),
            format_rupiah(*amount),
            time
        ),
        ShopEvent::StockExhausted {
            order_id,
            product_id,
            product_name,
        } => format!(
            "⚠️ <b>STOK HABIS!</b>\n🆔 <code>{}</code> sudah dibayar tapi tidak terkirim\n📦 {}\nSegera tambahkan stok untuk <code>{}</code>",
            escape(order_id),
            escape(product_name),
            escape(product_id)
        ),
        ShopEvent::LowStock {
            product_id,
            product_name,
            remaining,
        } => format!(
            "⚠️ <b>STOK MENIPIS</b>\n📦 {}\n📬 Sisa: <b>{}</b>\nTambahkan stok untuk <code>{}</code>",
            escape(product_name),
            remaining,
            escape(product_id)
        ),
        ShopEvent::Canceled { order_id } => {
            format!("🚫 <b>ORDER DIBATALKAN</b>\n🆔 <code>{}</code>", escape(order_id))
        }
        ShopEvent::CredentialDelivery {
            product_name,
            credential,
            expiry_date,
            ..
        } => format!(
            "✅ <b>Pembayaran Berhasil!</b>\n\n📦 <b>{}</b>\n⏱ Berlaku hingga: <b>{}</b>\n\n🔑 <b>Akun kamu:</b>\n<code>{}</code>\n\nTerima kasih sudah belanja! 🎉",
            escape(product_name),
            escape(expiry_date),
            escape(credential)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shop_core::DurationUnit;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn delivery() -> ShopEvent {
        ShopEvent::CredentialDelivery {
            target: "555".into(),
            order_id: "DS-1".into(),
            product_name: "Netflix Premium".into(),
            credential: "budi@mail.com:p<w>".into(),
            expiry_date: "28 February 2025".into(),
        }
    }

    #[test]
    fn test_render_new_order() {
        let text = render(
            &ShopEvent::NewOrder {
                order_id: "DS-1".into(),
                buyer_name: "<b>Budi</b>".into(),
                product_name: "Netflix Premium".into(),
                duration: 1,
                duration_unit: DurationUnit::Month,
                amount: 15000,
            },
            "01/01/2025 07.00.00",
        );
        assert!(text.contains("ORDER BARU"));
        assert!(text.contains("Rp 15.000"));
        assert!(text.contains("&lt;b&gt;Budi&lt;/b&gt;"));
        assert!(text.contains("1 month"));
    }

    #[test]
    fn test_render_credential_is_escaped() {
        let text = render(&delivery(), "-");
        assert!(text.contains("<code>budi@mail.com:p&lt;w&gt;</code>"));
        assert!(text.contains("28 February 2025"));
    }

    #[tokio::test]
    async fn test_delivery_goes_to_buyer_chat() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_json(json!({
                "chat_id": "555",
                "text": render(&delivery(), "-"),
                "parse_mode": "HTML"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(
            TelegramConfig::new("TOKEN", Some("999".into())).with_api_base_url(server.uri()),
        )
        .unwrap();
        notifier.notify(delivery()).await.unwrap();
    }

    #[tokio::test]
    async fn test_admin_events_need_admin_chat() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let notifier =
            TelegramNotifier::new(TelegramConfig::new("TOKEN", None).with_api_base_url(server.uri())).unwrap();
        notifier
            .notify(ShopEvent::Canceled {
                order_id: "DS-1".into(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_api_error_is_notification_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bot was blocked by the user"))
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(
            TelegramConfig::new("TOKEN", Some("999".into())).with_api_base_url(server.uri()),
        )
        .unwrap();
        let err = notifier.notify(delivery()).await.unwrap_err();
        assert!(matches!(err, ShopError::Notification(_)));
        assert!(err.to_string().contains("blocked"));
    }
}
