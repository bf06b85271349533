//! Row types exchanged with the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A `users` row as seen by the authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    #[serde(rename = "id")]
    pub user_id: String,
    pub org_id: String,
    pub api_key_hash: String,
}

/// One completed attempt (success or terminal failure). Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub org_id: String,
    pub task_type: String,
    pub model_used: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub latency_ms: u64,
    pub success: bool,
}

impl UsageRecord {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsideredModel {
    pub provider: String,
    pub model_name: String,
}

/// Audit row explaining which model served a request and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingLog {
    pub request_id: String,
    pub considered_models: Vec<ConsideredModel>,
    pub final_model: String,
    pub reason: String,
}

/// Subset of a `requests` row used for usage reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRow {
    #[serde(default)]
    pub model_used: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Inclusive time bounds for usage queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl UsageRange {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| ts >= from) && self.to.map_or(true, |to| ts <= to)
    }
}
