//! API request and response types.
//!
//! Chat bodies are validated by hand from a `serde_json::Value` so that every
//! problem is reported at once, as `{path, message}` pairs, instead of
//! stopping at serde's first error.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FieldError, GatewayError};
use crate::llm::{ChatMessage, Role};
use crate::routing::{LatencyPref, Priority, TaskType};
use crate::store::ConsideredModel;

pub const MAX_MESSAGES: usize = 100;

const INVALID_BODY: &str = "Invalid request body";
const ROLE_MESSAGE: &str = "Role must be one of: user, assistant, system";
const PRIORITY_MESSAGE: &str = "Priority must be one of: cheap, balanced, best, quality";
const LATENCY_MESSAGE: &str = "Latency preference must be: fast or normal";
const MAX_COST_MESSAGE: &str = "Max cost must be a positive number";
const TURN_MESSAGE: &str = "At least one user or assistant message is required";

/// A validated body for `/v1/chat`, `/v1/agent-step` and `/v1/router/debug`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub priority: Priority,
    pub latency_pref: LatencyPref,
    pub max_cost: Option<f64>,
}

pub fn parse_chat_request(body: &[u8]) -> Result<ChatRequest, GatewayError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        GatewayError::validation("Invalid JSON body", vec![FieldError::new("", e.to_string())])
    })?;
    let Value::Object(fields) = value else {
        return Err(GatewayError::validation(
            INVALID_BODY,
            vec![FieldError::new("", "Expected an object")],
        ));
    };

    let mut errors = Vec::new();
    let messages = parse_messages(fields.get("messages"), &mut errors);
    let priority = parse_choice(fields.get("priority"), "priority", PRIORITY_MESSAGE, &mut errors);
    let latency_pref = parse_choice(
        fields.get("latency_pref"),
        "latency_pref",
        LATENCY_MESSAGE,
        &mut errors,
    );
    let max_cost = parse_max_cost(fields.get("max_cost"), &mut errors);

    if !errors.is_empty() {
        return Err(GatewayError::validation(INVALID_BODY, errors));
    }
    Ok(ChatRequest {
        messages,
        priority,
        latency_pref,
        max_cost,
    })
}

fn parse_messages(value: Option<&Value>, errors: &mut Vec<FieldError>) -> Vec<ChatMessage> {
    let items = match value {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => {
            errors.push(FieldError::new("messages", "Required"));
            return Vec::new();
        }
        Some(_) => {
            errors.push(FieldError::new("messages", "Expected an array"));
            return Vec::new();
        }
    };

    if items.is_empty() {
        errors.push(FieldError::new("messages", "At least one message is required"));
    } else if items.len() > MAX_MESSAGES {
        errors.push(FieldError::new("messages", "Maximum 100 messages allowed"));
    }

    let messages: Vec<ChatMessage> = items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| parse_message(i, item, errors))
        .collect();

    // Providers reject a conversation with nothing but system prompts.
    let all_parsed = !messages.is_empty() && messages.len() == items.len();
    if all_parsed && messages.iter().all(|m| m.role == Role::System) {
        errors.push(FieldError::new("messages", TURN_MESSAGE));
    }
    messages
}

fn parse_message(index: usize, item: &Value, errors: &mut Vec<FieldError>) -> Option<ChatMessage> {
    let path = format!("messages.{}", index);
    let Value::Object(fields) = item else {
        errors.push(FieldError::new(path, "Expected an object"));
        return None;
    };

    let role = match fields.get("role").and_then(Value::as_str) {
        Some("user") => Some(Role::User),
        Some("assistant") => Some(Role::Assistant),
        Some("system") => Some(Role::System),
        _ => {
            errors.push(FieldError::new(format!("{}.role", path), ROLE_MESSAGE));
            None
        }
    };

    let content = match fields.get("content") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::String(_)) => {
            errors.push(FieldError::new(
                format!("{}.content", path),
                "Message content cannot be empty",
            ));
            None
        }
        None | Some(Value::Null) => {
            errors.push(FieldError::new(format!("{}.content", path), "Required"));
            None
        }
        Some(_) => {
            errors.push(FieldError::new(format!("{}.content", path), "Expected a string"));
            None
        }
    };

    Some(ChatMessage::new(role?, content?))
}

fn parse_choice<T>(
    value: Option<&Value>,
    path: &str,
    message: &str,
    errors: &mut Vec<FieldError>,
) -> T
where
    T: FromStr + Default,
{
    match value {
        None | Some(Value::Null) => T::default(),
        Some(Value::String(raw)) => raw.parse().unwrap_or_else(|_| {
            errors.push(FieldError::new(path, message));
            T::default()
        }),
        Some(_) => {
            errors.push(FieldError::new(path, message));
            T::default()
        }
    }
}

fn parse_max_cost(value: Option<&Value>, errors: &mut Vec<FieldError>) -> Option<f64> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_f64() {
            Some(n) if n.is_finite() && n > 0.0 => Some(n),
            _ => {
                errors.push(FieldError::new("max_cost", MAX_COST_MESSAGE));
                None
            }
        },
    }
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub output: String,
    pub model_used: String,
    pub cost: f64,
    pub latency_ms: u64,
    pub savings_estimate: f64,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct DebugReply {
    pub task_type: TaskType,
    pub considered_models: Vec<ConsideredModel>,
    pub selected_model: String,
    pub reason: String,
    pub request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusReply {
    pub status: &'static str,
}
