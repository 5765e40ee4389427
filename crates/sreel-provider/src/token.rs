//! Per-call provider credentials.
//!
//! The transport attaches a freshly minted bearer credential to every
//! outgoing request. Providers with access-key/secret-key auth get a
//! short-lived signed token per call; the simulation server needs none.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProviderResult};

/// Default lifetime of a minted token.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Not-before skew allowance, in seconds.
const NBF_SKEW_SECS: i64 = 5;

/// Mints the bearer credential for one outgoing provider call.
pub trait TokenMinter: Send + Sync {
    /// Returns the bearer token value, or `None` when the call should go
    /// out unauthenticated.
    fn mint(&self) -> ProviderResult<Option<String>>;
}

/// No credentials attached (simulation provider).
pub struct NoAuth;

impl TokenMinter for NoAuth {
    fn mint(&self) -> ProviderResult<Option<String>> {
        Ok(None)
    }
}

/// Fixed token, for tests and providers with long-lived API keys.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenMinter for StaticToken {
    fn mint(&self) -> ProviderResult<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

/// Claims carried by a minted provider token.
#[derive(Debug, Serialize, Deserialize)]
struct ProviderClaims {
    /// Access key identifying the caller
    iss: String,
    /// Expiry (unix seconds)
    exp: i64,
    /// Not before (unix seconds)
    nbf: i64,
}

/// Short-lived HS256 token minted from an access-key/secret-key pair.
pub struct KeyPairMinter {
    access_key: String,
    secret_key: String,
    ttl: Duration,
}

impl KeyPairMinter {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            ttl: DEFAULT_TOKEN_TTL,
        }
    }

    /// Create from `PROVIDER_ACCESS_KEY` / `PROVIDER_SECRET_KEY`.
    ///
    /// Returns `None` when the key pair is not configured, which callers
    /// treat as "run against the simulation provider".
    pub fn from_env() -> Option<Self> {
        let access_key = std::env::var("PROVIDER_ACCESS_KEY").ok()?;
        let secret_key = std::env::var("PROVIDER_SECRET_KEY").ok()?;
        Some(Self::new(access_key, secret_key))
    }
}

impl TokenMinter for KeyPairMinter {
    fn mint(&self) -> ProviderResult<Option<String>> {
        let now = Utc::now().timestamp();
        let claims = ProviderClaims {
            iss: self.access_key.clone(),
            exp: now + self.ttl.as_secs() as i64,
            nbf: now - NBF_SKEW_SECS,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret_key.as_bytes()),
        )
        .map_err(|e| ProviderError::TokenMint(e.to_string()))?;

        Ok(Some(token))
    }
}
