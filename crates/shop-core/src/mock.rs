//! # Test Doubles
//!
//! In-process gateway and notification sink used by the test suites of this
//! workspace.

use crate::error::{ShopError, ShopResult};
use crate::gateway::{PaymentGateway, PaymentRequest, SettlementStatus};
use crate::notify::{NotificationSink, ShopEvent};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// A gateway whose settlement answers are set by the test.
///
/// Orders without an explicit status report `Pending`.
#[derive(Debug, Default)]
pub struct MockGateway {
    statuses: Mutex<HashMap<String, SettlementStatus>>,
    created: Mutex<Vec<(String, u64)>>,
    queried: Mutex<Vec<(String, u64)>>,
    canceled: Mutex<Vec<(String, u64)>>,
    fail_create: AtomicBool,
    fail_cancel: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_status(&self, order_id: &str, status: SettlementStatus) {
        self.statuses
            .lock()
            .await
            .insert(order_id.to_string(), status);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_cancel(&self, fail: bool) {
        self.fail_cancel.store(fail, Ordering::SeqCst);
    }

    /// `(order_id, amount)` of every payment request created
    pub async fn created(&self) -> Vec<(String, u64)> {
        self.created.lock().await.clone()
    }

    pub async fn queried(&self) -> Vec<(String, u64)> {
        self.queried.lock().await.clone()
    }

    /// Cancel attempts, including ones that were made to fail
    pub async fn canceled(&self) -> Vec<(String, u64)> {
        self.canceled.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_payment_request(&self, order_id: &str, amount: u64) -> ShopResult<PaymentRequest> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ShopError::Gateway {
                provider: "mock".into(),
                message: "payment request rejected".into(),
            });
        }
        self.created
            .lock()
            .await
            .push((order_id.to_string(), amount));
        Ok(PaymentRequest {
            payload: format!("QR:{}:{}", order_id, amount),
            provider: "mock".into(),
        })
    }

    async fn query_status(&self, order_id: &str, amount: u64) -> SettlementStatus {
        self.queried
            .lock()
            .await
            .push((order_id.to_string(), amount));
        self.statuses
            .lock()
            .await
            .get(order_id)
            .copied()
            .unwrap_or(SettlementStatus::Pending)
    }

    async fn cancel_request(&self, order_id: &str, amount: u64) -> ShopResult<()> {
        self.canceled
            .lock()
            .await
            .push((order_id.to_string(), amount));
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(ShopError::NetworkError("connection reset".into()));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Sink that records every event it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ShopEvent>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record events but report every delivery as failed
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.fail.store(true, Ordering::SeqCst);
        sink
    }

    pub async fn events(&self) -> Vec<ShopEvent> {
        self.events.lock().await.clone()
    }

    pub async fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().await.iter().map(|e| e.kind()).collect()
    }

    pub async fn count(&self, kind: &str) -> usize {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.kind() == kind)
            .count()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, event: ShopEvent) -> ShopResult<()> {
        self.events.lock().await.push(event);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ShopError::Notification("sink offline".into()));
        }
        Ok(())
    }
}
