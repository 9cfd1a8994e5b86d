//! Firebase ID-token verification (RS256 against Google's published JWKS).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{
    decode, decode_header,
    errors::ErrorKind,
    jwk::{Jwk, JwkSet},
    Algorithm, DecodingKey, Validation,
};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::info;

use super::{AuthError, TokenVerifier, VerifiedToken};

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
/// Signing keys rotate roughly daily.
const JWKS_TTL: Duration = Duration::from_secs(60 * 60);
/// A fresh key set is refetched for an unknown `kid` at most this often.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

struct CachedKeys {
    set: JwkSet,
    fetched_at: Instant,
}

#[derive(Debug)]
enum KeyLookup {
    Found(Jwk),
    /// Not in a set fetched too recently to fetch again.
    Unknown,
    Refresh,
}

fn lookup(cached: Option<&CachedKeys>, kid: &str, now: Instant) -> KeyLookup {
    let Some(cached) = cached else {
        return KeyLookup::Refresh;
    };
    let age = now.saturating_duration_since(cached.fetched_at);
    if age >= JWKS_TTL {
        return KeyLookup::Refresh;
    }
    match cached.set.find(kid) {
        Some(jwk) => KeyLookup::Found(jwk.clone()),
        None if age < MIN_REFRESH_INTERVAL => KeyLookup::Unknown,
        None => KeyLookup::Refresh,
    }
}

fn unknown_key(kid: &str) -> AuthError {
    AuthError::Invalid(format!("unknown signing key {kid}"))
}

pub struct FirebaseVerifier {
    http: reqwest::Client,
    project_id: String,
    keys: RwLock<Option<CachedKeys>>,
}

impl FirebaseVerifier {
    pub fn new(project_id: String) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()?,
            project_id,
            keys: RwLock::new(None),
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[issuer_for(&self.project_id)]);
        validation
    }

    /// Looks up a signing key, refreshing the cached set when it is stale or
    /// does not contain `kid` (keys rotate). Refreshes for unknown ids are
    /// limited to one per `MIN_REFRESH_INTERVAL`.
    async fn key_for(&self, kid: &str) -> Result<Jwk, AuthError> {
        let found = {
            let cached = self.keys.read().await;
            lookup(cached.as_ref(), kid, Instant::now())
        };
        match found {
            KeyLookup::Found(jwk) => return Ok(jwk),
            KeyLookup::Unknown => return Err(unknown_key(kid)),
            KeyLookup::Refresh => {}
        }

        let mut cached = self.keys.write().await;
        // Another request may have refreshed while this one waited.
        match lookup(cached.as_ref(), kid, Instant::now()) {
            KeyLookup::Found(jwk) => return Ok(jwk),
            KeyLookup::Unknown => return Err(unknown_key(kid)),
            KeyLookup::Refresh => {}
        }

        let set = self.fetch_keys().await?;
        let jwk = set.find(kid).cloned();
        *cached = Some(CachedKeys {
            set,
            fetched_at: Instant::now(),
        });
        jwk.ok_or_else(|| unknown_key(kid))
    }

    async fn fetch_keys(&self) -> Result<JwkSet, AuthError> {
        let set: JwkSet = self
            .http
            .get(JWKS_URL)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::Keys(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::Keys(e.to_string()))?;
        info!("Fetched {} Firebase signing keys", set.keys.len());
        Ok(set)
    }
}

#[async_trait]
impl TokenVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let header = decode_header(token).map_err(map_jwt_error)?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::Invalid(format!("unexpected algorithm {:?}", header.alg)));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::Invalid("missing kid".to_string()))?;

        let jwk = self.key_for(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| AuthError::Keys(e.to_string()))?;

        let data = decode::<FirebaseClaims>(token, &key, &self.validation()).map_err(map_jwt_error)?;
        into_verified(data.claims)
    }
}

fn issuer_for(project_id: &str) -> String {
    format!("https://securetoken.google.com/{project_id}")
}

fn into_verified(claims: FirebaseClaims) -> Result<VerifiedToken, AuthError> {
    if claims.sub.is_empty() || claims.sub.len() > 128 {
        return Err(AuthError::Invalid("subject must be 1-128 characters".to_string()));
    }
    Ok(VerifiedToken {
        uid: claims.sub,
        email: claims.email,
        email_verified: claims.email_verified,
    })
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        _ => AuthError::Invalid(err.to_string()),
    }
}
