//! Gatekeeper: API key authentication followed by per-tenant rate limiting.
//!
//! Lookup is two-stage. Candidate rows are fetched by the key's 8-character
//! prefix, then the full key is verified against each candidate's salted hash.
//! A storage failure during lookup is an `internal_error`, never a 401.

mod keys;

pub use keys::{
    constant_time_eq, generate_api_key, hash_api_key_with_rounds,
    is_valid_api_key_format, key_prefix, verify_api_key, API_KEY_PREFIX, API_KEY_RANDOM_LENGTH,
    DEFAULT_HASH_ROUNDS, LOOKUP_PREFIX_LENGTH,
};

use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::{debug, error, warn};

use crate::error::GatewayError;
use crate::ratelimit::{RateLimitDecision, RateLimiter};
use crate::store::{ApiKeyRecord, SharedStore};

/// Identity of the caller for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub org_id: String,
    pub user_id: String,
}

impl TenantContext {
    /// Rate limit bucket for this tenant.
    pub fn rate_limit_key(&self) -> String {
        format!("org:{}", self.org_id)
    }
}

/// An admitted request.
#[derive(Debug, Clone)]
pub struct Admission {
    pub tenant: TenantContext,
    pub rate_limit: Option<RateLimitDecision>,
}

/// A refused request. `rate_limit` is set once the caller was authenticated.
#[derive(Debug)]
pub struct Rejection {
    pub error: GatewayError,
    pub rate_limit: Option<RateLimitDecision>,
}

impl From<GatewayError> for Rejection {
    fn from(error: GatewayError) -> Self {
        Self {
            error,
            rate_limit: None,
        }
    }
}

/// Pull the caller's key from `Authorization: Bearer` or `x-api-key`.
pub fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|k| !k.is_empty());

    bearer.or_else(|| {
        headers
            .get("x-api-key")
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|k| !k.is_empty())
    })
}

#[derive(Clone)]
pub struct Gatekeeper {
    store: SharedStore,
    limiter: RateLimiter,
}

impl Gatekeeper {
    pub fn new(store: SharedStore, limiter: RateLimiter) -> Self {
        Self { store, limiter }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Authenticate, then count the request against the tenant's window.
    pub async fn admit(&self, headers: &HeaderMap) -> Result<Admission, Rejection> {
        let key = extract_api_key(headers)
            .ok_or_else(|| GatewayError::InvalidApiKey("Missing or invalid API key".into()))?;
        let tenant = self.authenticate(key).await?;

        let rate_limit = self.limiter.check(&tenant.rate_limit_key()).await;
        if let Some(decision) = rate_limit {
            if !decision.ok {
                warn!(org_id = %tenant.org_id, limit = decision.limit, "Rate limit exceeded");
                return Err(Rejection {
                    error: GatewayError::RateLimited,
                    rate_limit,
                });
            }
        }

        Ok(Admission { tenant, rate_limit })
    }

    /// Resolve `key` to a tenant.
    pub async fn authenticate(&self, key: &str) -> Result<TenantContext, GatewayError> {
        if !is_valid_api_key_format(key) {
            return Err(GatewayError::InvalidApiKey("Invalid API key format".into()));
        }

        let candidates = self
            .store
            .find_api_keys_by_prefix(key_prefix(key))
            .await
            .map_err(|e| {
                error!("API key lookup failed: {}", e);
                GatewayError::Internal("Authentication service unavailable".into())
            })?;

        if candidates.is_empty() {
            return Err(GatewayError::InvalidApiKey("Invalid API key".into()));
        }

        // Hash verification is CPU-bound; keep it off the async workers.
        let owned_key = key.to_string();
        let matched = tokio::task::spawn_blocking(move || first_match(&owned_key, candidates))
            .await
            .map_err(|e| {
                error!("API key verification task failed: {}", e);
                GatewayError::Internal("Authentication failed".into())
            })?;

        match matched {
            Some(record) => {
                debug!(org_id = %record.org_id, "Authenticated API key");
                Ok(TenantContext {
                    org_id: record.org_id,
                    user_id: record.user_id,
                })
            }
            None => Err(GatewayError::InvalidApiKey("Invalid API key".into())),
        }
    }
}

fn first_match(key: &str, candidates: Vec<ApiKeyRecord>) -> Option<ApiKeyRecord> {
    candidates
        .into_iter()
        .find(|c| verify_api_key(key, &c.api_key_hash))
}
