use axum::{extract::State, http::HeaderMap, Json};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::VerifiedUser;
use crate::billing::gateway::{CheckoutItem, CheckoutParams};
use crate::billing::webhook::{plan_action, verify_signature, BillingAction, Event, WebhookError};
use crate::errors::AppError;
use crate::models::user::{MembershipRow, UserRow};
use crate::state::AppState;
use crate::users::store::{self, CreditGrant};

const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub membership: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub message: String,
    pub subscription_end: Option<DateTime<Utc>>,
}

/// POST /api/v1/payment/create_payment
pub async fn handle_create_payment(
    State(state): State<AppState>,
    VerifiedUser(claims): VerifiedUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let user = store::require_user(&state.db, &claims.uid).await?;
    let membership = store::find_membership(&state.db, &req.membership)
        .await?
        .ok_or_else(|| AppError::NotFound("Membership not found".to_string()))?;
    if membership.cost_cents <= 0 || membership.credits <= 0 {
        return Err(AppError::Validation(format!(
            "Membership '{}' cannot be purchased",
            membership.name
        )));
    }

    let item = CheckoutItem::OneTime {
        name: format!("{} ({} credits)", membership.name, membership.credits),
        amount_cents: membership.cost_cents,
    };
    checkout(&state, &user, &membership, item).await
}

/// POST /api/v1/payment/create_subscription
pub async fn handle_create_subscription(
    State(state): State<AppState>,
    VerifiedUser(claims): VerifiedUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let user = store::require_user(&state.db, &claims.uid).await?;
    let membership = store::find_membership(&state.db, &req.membership)
        .await?
        .filter(|m| m.stripe_price_id.is_some())
        .ok_or_else(|| AppError::NotFound("Membership or Stripe Price ID not found".to_string()))?;

    let item = CheckoutItem::Recurring {
        price_id: membership.stripe_price_id.clone().unwrap_or_default(),
    };
    checkout(&state, &user, &membership, item).await
}

async fn checkout(
    state: &AppState,
    user: &UserRow,
    membership: &MembershipRow,
    item: CheckoutItem,
) -> Result<Json<CheckoutResponse>, AppError> {
    let params = checkout_params(&state.config.frontend_url, user, membership, item);
    let session = state
        .payments
        .create_checkout_session(params)
        .await
        .map_err(|e| AppError::Payment(e.to_string()))?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

fn checkout_params(
    frontend_url: &str,
    user: &UserRow,
    membership: &MembershipRow,
    item: CheckoutItem,
) -> CheckoutParams {
    let base = frontend_url.trim_end_matches('/');
    CheckoutParams {
        item,
        metadata: vec![
            ("firebase_id".to_string(), user.firebase_id.clone()),
            ("membership".to_string(), membership.name.clone()),
            ("credits".to_string(), membership.credits.to_string()),
        ],
        customer_email: Some(user.email.clone()),
        success_url: format!("{base}/profile"),
        cancel_url: format!("{base}/"),
    }
}

/// POST /api/v1/payment/cancel_subscription
pub async fn handle_cancel_subscription(
    State(state): State<AppState>,
    VerifiedUser(claims): VerifiedUser,
) -> Result<Json<CancelResponse>, AppError> {
    let user = store::require_user(&state.db, &claims.uid).await?;
    let subscription_id = user
        .subscription_id
        .as_deref()
        .ok_or_else(|| AppError::NotFound("No active subscription".to_string()))?;

    let cancelled = state
        .payments
        .cancel_at_period_end(subscription_id)
        .await
        .map_err(|e| AppError::Payment(e.to_string()))?;
    store::mark_cancelled(&state.db, user.id, cancelled.ends_at).await?;
    info!("User {} cancelled subscription {}", user.id, cancelled.id);

    Ok(Json(CancelResponse {
        message: "Subscription will end at the close of the billing period".to_string(),
        subscription_end: cancelled.ends_at,
    }))
}

/// POST /api/v1/payment/webhook
///
/// Takes the raw body: the signature covers the exact bytes Stripe sent.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;
    verify_signature(
        &body,
        signature,
        &state.config.stripe_webhook_secret,
        Utc::now().timestamp(),
    )?;

    let event: Event = serde_json::from_slice(&body).map_err(WebhookError::from)?;
    let action = plan_action(&event)?;
    info!("Webhook {}: {:?}", event.event_type, action);
    apply_action(&state, action).await?;

    Ok(Json(json!({ "received": true })))
}

async fn apply_action(state: &AppState, action: BillingAction) -> Result<(), AppError> {
    match action {
        BillingAction::GrantCredits {
            event_id,
            firebase_id,
            credits,
        } => {
            let grant = store::grant_credits_once(&state.db, &event_id, &firebase_id, credits).await?;
            check_grant(&event_id, grant)?;
        }
        BillingAction::ActivateSubscription {
            firebase_id,
            membership,
            subscription_id,
        } => {
            if store::find_membership(&state.db, &membership).await?.is_none() {
                return Err(AppError::NotFound("Membership not found".to_string()));
            }
            if !store::activate_subscription(&state.db, &firebase_id, &membership, &subscription_id)
                .await?
            {
                return Err(AppError::NotFound("User not found".to_string()));
            }
        }
        BillingAction::EndSubscription { subscription_id } => {
            if !store::end_subscription(&state.db, &subscription_id).await? {
                warn!("No user holds ended subscription {subscription_id}");
            }
        }
        BillingAction::Ignore => {}
    }
    Ok(())
}

fn check_grant(event_id: &str, grant: CreditGrant) -> Result<(), AppError> {
    match grant {
        CreditGrant::Granted => Ok(()),
        CreditGrant::AlreadyProcessed => {
            info!("Event {event_id} already applied, ignoring redelivery");
            Ok(())
        }
        CreditGrant::UnknownUser => Err(AppError::NotFound("User not found".to_string())),
    }
}
