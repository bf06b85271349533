//! Request middleware.
//!
//! - Every request gets a correlation id (`x-request-id`), honoured from the
//!   client when it is at most 128 visible ASCII characters
//! - `/v1/*` requests pass through the [`Gatekeeper`](crate::auth::Gatekeeper);
//!   rate limit headers are attached to every authenticated response,
//!   rejections included
//! - Admin routes compare `x-admin-key` against `ADMIN_KEY`

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{warn, Instrument};
use uuid::Uuid;

use super::routes::AppState;
use crate::auth::{constant_time_eq, Rejection};
use crate::error::GatewayError;
use crate::ratelimit::RateLimitDecision;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation id of the current request, available as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn inbound_request_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(REQUEST_ID_HEADER)?.to_str().ok()?;
    let acceptable = !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value.bytes().all(|b| b.is_ascii_graphic());
    acceptable.then(|| value.to_string())
}

fn request_id_of(req: &Request<Body>) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

pub async fn assign_request_id(mut req: Request<Body>, next: Next) -> Response {
    let id = inbound_request_id(req.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(RequestId(id.clone()));

    let span = tracing::info_span!("request", request_id = %id);
    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(decision.reset_seconds));
}

/// Authenticate and rate limit, then expose the tenant to handlers.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match state.gatekeeper.admit(req.headers()).await {
        Ok(admission) => {
            req.extensions_mut().insert(admission.tenant);
            let mut response = next.run(req).await;
            if let Some(decision) = &admission.rate_limit {
                apply_rate_limit_headers(response.headers_mut(), decision);
            }
            response
        }
        Err(Rejection { error, rate_limit }) => {
            let mut response = error.with_request_id(request_id_of(&req)).into_response();
            if let Some(decision) = &rate_limit {
                apply_rate_limit_headers(response.headers_mut(), decision);
            }
            response
        }
    }
}

pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let provided = req
        .headers()
        .get("x-admin-key")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let authorized = match state.admin_key.as_deref() {
        Some(expected) => constant_time_eq(provided.as_bytes(), expected.as_bytes()),
        None => false,
    };
    if !authorized {
        warn!("Rejected admin request");
        return GatewayError::InvalidApiKey("Invalid admin key".into())
            .with_request_id(request_id_of(&req))
            .into_response();
    }
    next.run(req).await
}
