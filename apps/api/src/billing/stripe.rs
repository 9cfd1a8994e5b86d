//! Stripe over its form-encoded REST API.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::billing::gateway::{
    CancelledSubscription, CheckoutItem, CheckoutParams, CheckoutSession, PaymentGateway,
};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
const CURRENCY: &str = "usd";

pub struct StripeClient {
    http: Client,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    cancel_at: Option<i64>,
    current_period_end: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: String,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Result<Self> {
        Ok(Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            secret_key,
        })
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T> {
        let response = self
            .http
            .post(format!("{STRIPE_API_BASE}{path}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await
            .with_context(|| format!("Stripe request to {path} failed"))?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<StripeErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(anyhow!("Stripe returned {status}: {message}"));
        }
        serde_json::from_str(&body).with_context(|| format!("Unexpected Stripe response from {path}"))
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(&self, params: CheckoutParams) -> Result<CheckoutSession> {
        let form = checkout_form(&params);
        let session: SessionObject = self.post_form("/checkout/sessions", &form).await?;
        info!(
            "Created Stripe {} checkout session {}",
            params.item.mode().as_str(),
            session.id
        );
        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    async fn cancel_at_period_end(&self, subscription_id: &str) -> Result<CancelledSubscription> {
        let form = [("cancel_at_period_end".to_string(), "true".to_string())];
        let subscription: SubscriptionObject = self
            .post_form(&format!("/subscriptions/{subscription_id}"), &form)
            .await?;
        let ends_at = subscription
            .cancel_at
            .or(subscription.current_period_end)
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single());
        info!("Stripe subscription {} set to cancel at period end", subscription.id);
        Ok(CancelledSubscription {
            id: subscription.id,
            ends_at,
        })
    }
}

/// Flattens checkout params into Stripe's bracketed form keys.
fn checkout_form(params: &CheckoutParams) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), params.item.mode().as_str().to_string()),
        ("success_url".to_string(), params.success_url.clone()),
        ("cancel_url".to_string(), params.cancel_url.clone()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
    ];

    match &params.item {
        CheckoutItem::OneTime { name, amount_cents } => {
            form.push((
                "line_items[0][price_data][currency]".to_string(),
                CURRENCY.to_string(),
            ));
            form.push((
                "line_items[0][price_data][unit_amount]".to_string(),
                amount_cents.to_string(),
            ));
            form.push((
                "line_items[0][price_data][product_data][name]".to_string(),
                name.clone(),
            ));
        }
        CheckoutItem::Recurring { price_id } => {
            form.push(("line_items[0][price]".to_string(), price_id.clone()));
        }
    }

    for (key, value) in &params.metadata {
        form.push((format!("metadata[{key}]"), value.clone()));
    }
    if let Some(email) = &params.customer_email {
        form.push(("customer_email".to_string(), email.clone()));
    }
    form
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn params(item: CheckoutItem) -> CheckoutParams {
        CheckoutParams {
            item,
            metadata: vec![
                ("firebase_id".to_string(), "uid-1".to_string()),
                ("credits".to_string(), "5".to_string()),
            ],
            customer_email: Some("ada@example.com".to_string()),
            success_url: "http://localhost:3001/profile".to_string(),
            cancel_url: "http://localhost:3001/".to_string(),
        }
    }

    #[test]
    fn test_one_time_checkout_form() {
        let form = checkout_form(&params(CheckoutItem::OneTime {
            name: "starter".to_string(),
            amount_cents: 499,
        }));
        assert_eq!(value(&form, "mode"), Some("payment"));
        assert_eq!(value(&form, "line_items[0][price_data][unit_amount]"), Some("499"));
        assert_eq!(value(&form, "line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(value(&form, "metadata[credits]"), Some("5"));
        assert_eq!(value(&form, "metadata[firebase_id]"), Some("uid-1"));
        assert_eq!(value(&form, "customer_email"), Some("ada@example.com"));
        assert!(value(&form, "line_items[0][price]").is_none());
    }

    #[test]
    fn test_subscription_checkout_form() {
        let form = checkout_form(&params(CheckoutItem::Recurring {
            price_id: "price_pro".to_string(),
        }));
        assert_eq!(value(&form, "mode"), Some("subscription"));
        assert_eq!(value(&form, "line_items[0][price]"), Some("price_pro"));
        assert!(value(&form, "line_items[0][price_data][unit_amount]").is_none());
        assert_eq!(value(&form, "success_url"), Some("http://localhost:3001/profile"));
    }

    #[test]
    fn test_subscription_object_parses_period_end() {
        let sub: SubscriptionObject = serde_json::from_str(
            r#"{"id":"sub_1","cancel_at":null,"current_period_end":1767225600,"status":"active"}"#,
        )
        .unwrap();
        assert_eq!(sub.cancel_at, None);
        assert_eq!(sub.current_period_end, Some(1_767_225_600));
    }
}
