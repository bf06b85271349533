//! `POST /v1/router/debug`: the routing decision without a provider call.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, State},
    response::Json,
};

use crate::budget::estimate_tokens_from_messages;
use crate::error::{ApiError, GatewayError};
use crate::routing::{classify, RoutingRequest};
use crate::store::ConsideredModel;

use super::auth::RequestId;
use super::routes::AppState;
use super::types::{parse_chat_request, DebugReply};

/// How many ranked candidates the debug view shows.
const DEBUG_CANDIDATES: usize = 5;

pub async fn debug_routing(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<DebugReply>, ApiError> {
    let fail = |e: GatewayError| e.with_request_id(request_id.clone());

    let request = parse_chat_request(&body).map_err(fail)?;

    let providers = state.dispatcher.providers().configured();
    if providers.is_empty() {
        return Err(fail(GatewayError::Provider("No providers configured".into())));
    }

    let task_type = classify(&request.messages);
    let routing = RoutingRequest::new(task_type, request.priority, request.latency_pref)
        .with_max_cost(request.max_cost)
        .with_token_estimate(estimate_tokens_from_messages(&request.messages))
        .with_providers(providers);
    let decision = state.engine.decide(&routing).await;

    let Some(selected) = decision.primary() else {
        return Err(fail(match request.max_cost {
            Some(_) => GatewayError::MaxCostExceeded("No available models satisfy max_cost".into()),
            None => GatewayError::Internal("No models available for configured providers".into()),
        }));
    };

    Ok(Json(DebugReply {
        task_type,
        considered_models: decision
            .candidates
            .iter()
            .take(DEBUG_CANDIDATES)
            .map(|m| ConsideredModel {
                provider: m.provider.to_string(),
                model_name: m.model_name.clone(),
            })
            .collect(),
        selected_model: selected.qualified_name(),
        reason: decision.reason.clone(),
        request_id,
    }))
}
