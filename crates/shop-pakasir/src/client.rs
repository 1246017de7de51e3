//! # Pakasir QRIS Gateway
//!
//! `PaymentGateway` implementation over the Pakasir transaction API.

use crate::config::PakasirConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shop_core::{PaymentGateway, PaymentRequest, SettlementStatus, ShopError, ShopResult};
use tracing::{debug, error, info, instrument, warn};

const PROVIDER: &str = "pakasir";

/// QRIS payments through Pakasir
pub struct PakasirGateway {
    config: PakasirConfig,
    client: Client,
}

impl PakasirGateway {
    pub fn new(config: PakasirConfig) -> ShopResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ShopError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> ShopResult<Self> {
        Self::new(PakasirConfig::from_env()?)
    }

    pub fn config(&self) -> &PakasirConfig {
        &self.config
    }

    fn transaction<'a>(&'a self, order_id: &'a str, amount: u64) -> TransactionBody<'a> {
        TransactionBody {
            project: &self.config.project,
            order_id,
            amount,
            api_key: &self.config.api_key,
        }
    }

    async fn fetch_status(&self, order_id: &str, amount: u64) -> ShopResult<String> {
        let amount = amount.to_string();
        let response = self
            .client
            .get(self.config.endpoint("transactiondetail"))
            .query(&[
                ("project", self.config.project.as_str()),
                ("amount", amount.as_str()),
                ("order_id", order_id),
                ("api_key", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let body = response.text().await.map_err(network_error)?;
        if !status.is_success() {
            return Err(gateway_error(format!("HTTP {}: {}", status, body)));
        }

        let detail: DetailResponse = serde_json::from_str(&body)?;
        detail
            .transaction
            .and_then(|t| t.status)
            .or(detail.status)
            .ok_or_else(|| gateway_error("response carries no status"))
    }
}

#[async_trait]
impl PaymentGateway for PakasirGateway {
    #[instrument(skip(self), fields(provider = PROVIDER))]
    async fn create_payment_request(&self, order_id: &str, amount: u64) -> ShopResult<PaymentRequest> {
        debug!("creating QRIS transaction");

        let response = self
            .client
            .post(self.config.endpoint("transactioncreate/qris"))
            .json(&self.transaction(order_id, amount))
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let body = response.text().await.map_err(network_error)?;

        if !status.is_success() {
            error!(%status, body = %body, "Pakasir API error");
            return Err(gateway_error(format!("HTTP {}: {}", status, body)));
        }

        let created: CreateResponse = serde_json::from_str(&body).map_err(|e| {
            ShopError::Serialization(format!("failed to parse Pakasir response: {}", e))
        })?;

        let payment = created
            .payment
            .ok_or_else(|| gateway_error("response carries no payment"))?;

        info!(
            expired_at = payment.expired_at.as_deref().unwrap_or("-"),
            "created QRIS transaction"
        );

        Ok(PaymentRequest {
            payload: payment.payment_number,
            provider: PROVIDER.to_string(),
        })
    }

    #[instrument(skip(self), fields(provider = PROVIDER))]
    async fn query_status(&self, order_id: &str, amount: u64) -> SettlementStatus {
        match self.fetch_status(order_id, amount).await {
            Ok(raw) => {
                let status = SettlementStatus::from_provider_status(&raw);
                debug!(raw = %raw, ?status, "transaction status");
                status
            }
            Err(e) => {
                warn!(error = %e, "status query failed");
                SettlementStatus::Unknown
            }
        }
    }

    #[instrument(skip(self), fields(provider = PROVIDER))]
    async fn cancel_request(&self, order_id: &str, amount: u64) -> ShopResult<()> {
        let response = self
            .client
            .post(self.config.endpoint("transactioncancel"))
            .json(&self.transaction(order_id, amount))
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(gateway_error(format!("HTTP {}: {}", status, body)));
        }
        debug!("transaction canceled upstream");
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

fn network_error(e: reqwest::Error) -> ShopError {
    if e.is_timeout() {
        ShopError::NetworkError(format!("Pakasir request timed out: {}", e))
    } else {
        ShopError::NetworkError(e.to_string())
    }
}

fn gateway_error(message: impl Into<String>) -> ShopError {
    ShopError::Gateway {
        provider: PROVIDER.to_string(),
        message: message.into(),
    }
}

// =============================================================================
// Pakasir API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct TransactionBody<'a> {
    project: &'a str,
    order_id: &'a str,
    amount: u64,
    api_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    payment: Option<CreatedPayment>,
}

#[derive(Debug, Deserialize)]
struct CreatedPayment {
    payment_number: String,
    #[serde(default)]
    expired_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    #[serde(default)]
    transaction: Option<TransactionDetail>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionDetail {
    #[serde(default)]
    status: Option<String>,
}
