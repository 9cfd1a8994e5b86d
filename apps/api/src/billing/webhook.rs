//! Stripe webhook verification and event planning.
//!
//! `verify_signature` must pass before a payload is even parsed. Planning is
//! pure; the handler applies the resulting `BillingAction` to the database.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use crate::errors::AppError;

/// Maximum age of a signed timestamp, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing Stripe-Signature header")]
    MissingSignature,

    #[error("malformed signature header")]
    MalformedSignature,

    #[error("signature timestamp outside tolerance")]
    Expired,

    #[error("no matching signature")]
    Mismatch,

    #[error("invalid event payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("event is missing {0}")]
    MissingField(&'static str),
}

impl From<WebhookError> for AppError {
    fn from(e: WebhookError) -> Self {
        AppError::Validation(format!("Webhook error: {e}"))
    }
}

/// Checks a `t=<unix>,v1=<hex>[,v1=<hex>...]` header against the raw body.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), WebhookError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for item in header.split(',') {
        let Some((key, value)) = item.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse()
                        .map_err(|_| WebhookError::MalformedSignature)?,
                )
            }
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedSignature)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedSignature);
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(WebhookError::Expired);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::Mismatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    if signatures
        .iter()
        .any(|signature| mac.clone().verify_slice(signature).is_ok())
    {
        Ok(())
    } else {
        Err(WebhookError::Mismatch)
    }
}

#[derive(Debug, Deserialize)]
pub struct Event {
    /// Stable across redeliveries of the same event.
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    mode: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    subscription: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
}

/// The database change an event calls for.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingAction {
    /// Applied at most once per `event_id`.
    GrantCredits {
        event_id: String,
        firebase_id: String,
        credits: i32,
    },
    ActivateSubscription {
        firebase_id: String,
        membership: String,
        subscription_id: String,
    },
    EndSubscription {
        subscription_id: String,
    },
    Ignore,
}

pub fn plan_action(event: &Event) -> Result<BillingAction, WebhookError> {
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSessionObject = serde_json::from_value(event.data.object.clone())?;
            plan_checkout(&event.id, session)
        }
        "customer.subscription.deleted" => {
            let subscription: SubscriptionObject =
                serde_json::from_value(event.data.object.clone())?;
            Ok(BillingAction::EndSubscription {
                subscription_id: subscription.id,
            })
        }
        _ => Ok(BillingAction::Ignore),
    }
}

fn plan_checkout(
    event_id: &str,
    mut session: CheckoutSessionObject,
) -> Result<BillingAction, WebhookError> {
    let firebase_id = session
        .metadata
        .remove("firebase_id")
        .filter(|id| !id.is_empty())
        .ok_or(WebhookError::MissingField("metadata.firebase_id"))?;

    match session.mode.as_str() {
        "payment" => {
            let credits = session
                .metadata
                .get("credits")
                .and_then(|c| c.trim().parse::<i32>().ok())
                .filter(|c| *c > 0)
                .ok_or(WebhookError::MissingField("metadata.credits"))?;
            Ok(BillingAction::GrantCredits {
                event_id: event_id.to_string(),
                firebase_id,
                credits,
            })
        }
        "subscription" => {
            let membership = session
                .metadata
                .remove("membership")
                .filter(|m| !m.is_empty())
                .ok_or(WebhookError::MissingField("metadata.membership"))?;
            let subscription_id = session
                .subscription
                .ok_or(WebhookError::MissingField("subscription"))?;
            Ok(BillingAction::ActivateSubscription {
                firebase_id,
                membership,
                subscription_id,
            })
        }
        _ => Ok(BillingAction::Ignore),
    }
}
