pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::billing::handlers as billing;
use crate::optimize::handlers as optimize;
use crate::state::AppState;
use crate::users::handlers as users;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Users
        .route("/api/v1/user/create", post(users::handle_create_user))
        .route("/api/v1/user/profile", get(users::handle_profile))
        .route(
            "/api/v1/user/upload_resume",
            post(users::handle_upload_resume),
        )
        .route(
            "/api/v1/user/retrieve_resume",
            get(users::handle_retrieve_resume),
        )
        // Optimization
        .route("/api/v1/ai/optimize", post(optimize::handle_optimize))
        .route("/api/v1/ai/ats", post(optimize::handle_ats))
        // Billing
        .route(
            "/api/v1/payment/create_payment",
            post(billing::handle_create_payment),
        )
        .route(
            "/api/v1/payment/create_subscription",
            post(billing::handle_create_subscription),
        )
        .route(
            "/api/v1/payment/cancel_subscription",
            post(billing::handle_cancel_subscription),
        )
        .route("/api/v1/payment/webhook", post(billing::handle_webhook))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
