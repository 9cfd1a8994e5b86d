use std::sync::Arc;

use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::auth::TokenVerifier;
use crate::billing::gateway::PaymentGateway;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::render::Renderer;
use crate::storage::ContentStore;

/// Shared application state injected into all route handlers via Axum extractors.
/// Every dependency is constructed once in `main` and passed in explicitly.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Holds the per-user optimization run locks.
    pub redis: RedisClient,
    pub storage: ContentStore,
    pub llm: LlmClient,
    pub config: Config,
    /// ID-token verifier. Firebase in production.
    pub auth: Arc<dyn TokenVerifier>,
    /// Payment provider. Stripe in production.
    pub payments: Arc<dyn PaymentGateway>,
    pub renderer: Renderer,
}
