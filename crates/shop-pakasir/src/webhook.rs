//! # Pakasir Webhook Handling
//!
//! Pakasir posts a JSON notice to the shop when a transaction settles:
//!
//! ```json
//! {
//!   "amount": 15000,
//!   "order_id": "DS-1735689600000-000001",
//!   "project": "digishop",
//!   "status": "completed",
//!   "payment_method": "qris",
//!   "completed_at": "2025-01-01T00:05:00Z"
//! }
//! ```
//!
//! Notices are unsigned. The engine never trusts them blindly: it confirms
//! only orders it knows, and only when the amount matches.

use serde_json::Value;
use shop_core::{ShopError, ShopResult, WebhookNotice};
use tracing::{debug, warn};

/// Parsed Pakasir settlement notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PakasirWebhook {
    pub order_id: String,
    pub status: String,
    pub amount: Option<u64>,
    pub project: Option<String>,
    pub payment_method: Option<String>,
}

impl PakasirWebhook {
    /// Parse a raw request body
    pub fn parse(payload: &[u8]) -> ShopResult<Self> {
        let raw: Value = serde_json::from_slice(payload)
            .map_err(|e| ShopError::WebhookParseError(format!("invalid JSON: {}", e)))?;
        Self::from_value(&raw)
    }

    pub fn from_value(raw: &Value) -> ShopResult<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| ShopError::WebhookParseError("payload is not an object".to_string()))?;

        let order_id = obj
            .get("order_id")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .ok_or_else(|| ShopError::WebhookParseError("missing order_id".to_string()))?;

        // A notice without status is kept and later ignored as unsettled
        let status = obj
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        // An unreadable amount drops only the amount check, never the notice
        let amount = match obj.get("amount") {
            None | Some(Value::Null) => None,
            Some(raw) => {
                let amount = parse_amount(raw);
                if amount.is_none() {
                    warn!(order_id = %order_id, amount = %raw, "unreadable webhook amount");
                }
                amount
            }
        };

        let project = obj.get("project").and_then(|v| v.as_str()).map(String::from);
        let payment_method = obj
            .get("payment_method")
            .and_then(|v| v.as_str())
            .map(String::from);

        debug!(order_id = %order_id, status = %status, "parsed Pakasir webhook");

        Ok(Self {
            order_id,
            status,
            amount,
            project,
            payment_method,
        })
    }

    /// Whether the notice was sent for `project`. Notices without a project
    /// field are accepted.
    pub fn is_for_project(&self, project: &str) -> bool {
        self.project.as_deref().map_or(true, |p| p == project)
    }

    pub fn into_notice(self) -> WebhookNotice {
        WebhookNotice {
            order_id: self.order_id,
            status: self.status,
            amount: self.amount,
        }
    }
}

/// Whole, non-negative rupiah amounts: `15000`, `15000.0` or `"15000"`
fn parse_amount(raw: &Value) -> Option<u64> {
    match raw {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole_amount)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_amount))
        }
        _ => None,
    }
}

fn whole_amount(value: f64) -> Option<u64> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_settlement_notice() {
        let body = json!({
            "amount": 15000,
            "order_id": "DS-1-000001",
            "project": "digishop",
            "status": "completed",
            "payment_method": "qris",
            "completed_at": "2025-01-01T00:05:00Z"
        });
        let webhook = PakasirWebhook::parse(body.to_string().as_bytes()).unwrap();

        assert_eq!(webhook.order_id, "DS-1-000001");
        assert_eq!(webhook.amount, Some(15000));
        assert!(webhook.is_for_project("digishop"));
        assert!(!webhook.is_for_project("other"));

        let notice = webhook.into_notice();
        assert_eq!(notice.status, "completed");
        assert_eq!(notice.amount, Some(15000));
    }

    #[test]
    fn test_minimal_notice() {
        let webhook = PakasirWebhook::from_value(&json!({ "order_id": "DS-1", "status": "paid" })).unwrap();
        assert_eq!(webhook.amount, None);
        assert!(webhook.is_for_project("anything"));
    }

    #[test]
    fn test_amount_as_string() {
        let webhook =
            PakasirWebhook::from_value(&json!({ "order_id": "DS-1", "status": "paid", "amount": "15000" }))
                .unwrap();
        assert_eq!(webhook.amount, Some(15000));
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(PakasirWebhook::parse(b"not json").is_err());
        assert!(PakasirWebhook::from_value(&json!([1, 2])).is_err());
        assert!(PakasirWebhook::from_value(&json!({ "status": "paid" })).is_err());
        assert!(PakasirWebhook::from_value(&json!({ "order_id": "", "status": "paid" })).is_err());
    }

    #[test]
    fn test_whole_float_amounts() {
        for amount in [json!(15000.0), json!("15000.00")] {
            let webhook =
                PakasirWebhook::from_value(&json!({ "order_id": "DS-1", "status": "paid", "amount": amount }))
                    .unwrap();
            assert_eq!(webhook.amount, Some(15000));
        }
    }

    #[test]
    fn test_unreadable_amount_keeps_notice() {
        for amount in [json!(-5), json!(15000.5), json!("abc"), json!(true)] {
            let webhook =
                PakasirWebhook::from_value(&json!({ "order_id": "DS-1", "status": "paid", "amount": amount }))
                    .unwrap();
            assert_eq!(webhook.order_id, "DS-1");
            assert_eq!(webhook.amount, None);
        }
    }
}
