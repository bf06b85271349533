//! `POST /v1/chat` and `POST /v1/agent-step`.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Extension, State},
    response::Json,
};
use tracing::{error, info};

use crate::auth::TenantContext;
use crate::budget::{cost, estimate_tokens_from_messages, premium_baseline, round_money, savings};
use crate::error::{ApiError, GatewayError};
use crate::registry::{Model, Provider};
use crate::routing::{classify, RoutingRequest, TaskType};
use crate::usage::{RoutingTrace, UsageRecord};

use super::auth::RequestId;
use super::routes::AppState;
use super::types::{parse_chat_request, ChatReply, ChatRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Chat,
    AgentStep,
}

impl Endpoint {
    fn task_type(self, request: &ChatRequest) -> TaskType {
        match self {
            Self::Chat => classify(&request.messages),
            Self::AgentStep => TaskType::Chat,
        }
    }

    /// `task_type` column written to the usage row.
    fn recorded_task(self, task_type: TaskType) -> &'static str {
        match self {
            Self::Chat => task_type.as_str(),
            Self::AgentStep => "agent_step",
        }
    }

    fn logs_routing(self) -> bool {
        self == Self::Chat
    }
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Extension(tenant): Extension<TenantContext>,
    body: Bytes,
) -> Result<Json<ChatReply>, ApiError> {
    complete(&state, Endpoint::Chat, request_id, &tenant, &body)
        .await
        .map(Json)
}

pub async fn agent_step(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Extension(tenant): Extension<TenantContext>,
    body: Bytes,
) -> Result<Json<ChatReply>, ApiError> {
    complete(&state, Endpoint::AgentStep, request_id, &tenant, &body)
        .await
        .map(Json)
}

/// Candidates when routing found nothing eligible.
fn fallback_candidates(
    state: &AppState,
    max_cost: Option<f64>,
) -> Result<Vec<Model>, GatewayError> {
    if max_cost.is_some() {
        return Err(GatewayError::MaxCostExceeded(
            "No available models satisfy max_cost".into(),
        ));
    }
    if state.dispatcher.providers().is_configured(Provider::OpenAi) {
        info!("No eligible registry models, using built-in default");
        return Ok(vec![Model::builtin_default()]);
    }
    Err(GatewayError::Internal(
        "No models available for configured providers".into(),
    ))
}

async fn complete(
    state: &AppState,
    endpoint: Endpoint,
    request_id: RequestId,
    tenant: &TenantContext,
    body: &[u8],
) -> Result<ChatReply, ApiError> {
    let RequestId(request_id) = request_id;
    let request = parse_chat_request(body).map_err(|e| e.with_request_id(request_id.clone()))?;

    let started = Instant::now();
    let task_type = endpoint.task_type(&request);
    let routing = RoutingRequest::new(task_type, request.priority, request.latency_pref)
        .with_max_cost(request.max_cost)
        .with_token_estimate(estimate_tokens_from_messages(&request.messages))
        .with_providers(state.dispatcher.providers().configured());

    let decision = state.engine.decide(&routing).await;
    let candidates = if decision.is_empty() {
        fallback_candidates(state, request.max_cost)
            .map_err(|e| e.with_request_id(request_id.clone()))?
    } else {
        decision.candidates
    };

    let result = state.dispatcher.dispatch(&candidates, &request.messages).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    let recorded_task = endpoint.recorded_task(task_type).to_string();

    let completion = match result {
        Ok(completion) => completion,
        Err(e) => {
            error!(
                org_id = %tenant.org_id,
                attempted = ?e.attempted(),
                latency_ms,
                "All providers failed"
            );
            let model_used = candidates
                .first()
                .map(|m| m.model_name.clone())
                .unwrap_or_default();
            state.recorder.record(
                UsageRecord {
                    org_id: tenant.org_id.clone(),
                    task_type: recorded_task,
                    model_used,
                    input_tokens: 0,
                    output_tokens: 0,
                    cost: 0.0,
                    latency_ms,
                    success: false,
                },
                None,
            );
            return Err(
                GatewayError::Provider("All providers failed".into()).with_request_id(request_id)
            );
        }
    };

    let model = &completion.model;
    let spent = cost(model, completion.input_tokens, completion.output_tokens);
    let saved = savings(
        spent,
        premium_baseline(completion.input_tokens, completion.output_tokens),
    );

    let trace = endpoint
        .logs_routing()
        .then(|| RoutingTrace::new(&candidates, &model.model_name, &decision.reason));
    state.recorder.record(
        UsageRecord {
            org_id: tenant.org_id.clone(),
            task_type: recorded_task,
            model_used: model.model_name.clone(),
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
            cost: spent,
            latency_ms,
            success: true,
        },
        trace,
    );

    info!(
        org_id = %tenant.org_id,
        task = %task_type,
        provider = %model.provider,
        model = %model.model_name,
        attempts = completion.attempted.len(),
        latency_ms,
        "Request served"
    );

    Ok(ChatReply {
        model_used: model.model_name.clone(),
        output: completion.content,
        cost: round_money(spent),
        latency_ms,
        savings_estimate: round_money(saved),
        request_id,
    })
}
