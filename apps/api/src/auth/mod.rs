//! Bearer-token authentication.
//!
//! Identity is delegated to Firebase: we only verify ID tokens. `AppState`
//! holds an `Arc<dyn TokenVerifier>` so handlers never know which backend
//! issued the token.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use serde::Deserialize;
use thiserror::Error;

use crate::errors::AppError;
use crate::state::AppState;

pub mod firebase;

/// Claims we rely on after a token has been verified.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedToken {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No token provided or invalid format")]
    MissingToken,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Signing keys unavailable: {0}")]
    Keys(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => AppError::Unauthorized(err.to_string()),
            AuthError::Expired => AppError::Unauthorized("Token expired".to_string()),
            AuthError::Invalid(reason) => {
                tracing::warn!("Rejected token: {reason}");
                AppError::Unauthorized("Invalid token".to_string())
            }
            AuthError::Keys(reason) => {
                AppError::Internal(anyhow::anyhow!("Failed to authenticate user: {reason}"))
            }
        }
    }
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError>;
}

/// Any caller holding a valid ID token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub VerifiedToken);

/// A caller whose email address has been verified. Required for anything
/// that spends credits or money.
#[derive(Debug, Clone)]
pub struct VerifiedUser(pub VerifiedToken);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(&parts.headers)?;
        let claims = state.auth.verify(token).await?;
        Ok(AuthUser(claims))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for VerifiedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if !claims.email_verified {
            return Err(AppError::Forbidden("Email address not verified".to_string()));
        }
        Ok(VerifiedUser(claims))
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}
