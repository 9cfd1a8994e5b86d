//! Payment provider seam. `AppState` holds an `Arc<dyn PaymentGateway>`;
//! Stripe in production, an in-memory fake in tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    Payment,
    Subscription,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Payment => "payment",
            CheckoutMode::Subscription => "subscription",
        }
    }
}

/// What the customer is buying.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutItem {
    /// One-time purchase priced inline.
    OneTime { name: String, amount_cents: i64 },
    /// Recurring plan priced by the provider.
    Recurring { price_id: String },
}

impl CheckoutItem {
    pub fn mode(&self) -> CheckoutMode {
        match self {
            CheckoutItem::OneTime { .. } => CheckoutMode::Payment,
            CheckoutItem::Recurring { .. } => CheckoutMode::Subscription,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutParams {
    pub item: CheckoutItem,
    /// Echoed back on the completed-session webhook.
    pub metadata: Vec<(String, String)>,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelledSubscription {
    pub id: String,
    /// When access ends; `None` if the provider did not say.
    pub ends_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, params: CheckoutParams) -> Result<CheckoutSession>;

    async fn cancel_at_period_end(&self, subscription_id: &str) -> Result<CancelledSubscription>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records checkout requests and answers with canned ids.
    #[derive(Default)]
    pub struct FakePaymentGateway {
        pub checkouts: Mutex<Vec<CheckoutParams>>,
        pub cancelled: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PaymentGateway for FakePaymentGateway {
        async fn create_checkout_session(&self, params: CheckoutParams) -> Result<CheckoutSession> {
            let mut checkouts = self.checkouts.lock().unwrap();
            checkouts.push(params);
            Ok(CheckoutSession {
                id: format!("cs_test_{}", checkouts.len()),
                url: Some("https://checkout.example/session".to_string()),
            })
        }

        async fn cancel_at_period_end(&self, subscription_id: &str) -> Result<CancelledSubscription> {
            self.cancelled
                .lock()
                .unwrap()
                .push(subscription_id.to_string());
            Ok(CancelledSubscription {
                id: subscription_id.to_string(),
                ends_at: None,
            })
        }
    }

    #[tokio::test]
    async fn test_fake_gateway_records_checkouts() {
        let gateway = FakePaymentGateway::default();
        let session = gateway
            .create_checkout_session(CheckoutParams {
                item: CheckoutItem::Recurring {
                    price_id: "price_123".to_string(),
                },
                metadata: Vec::new(),
                customer_email: None,
                success_url: "http://localhost:3001/profile".to_string(),
                cancel_url: "http://localhost:3001/".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(session.id, "cs_test_1");
        assert_eq!(gateway.checkouts.lock().unwrap()[0].item.mode(), CheckoutMode::Subscription);
    }
}
