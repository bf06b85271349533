//! Usage accounting: the append-only audit write and tenant-level aggregation.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::budget::{premium_baseline, round_money, savings};
use crate::registry::Model;
pub use crate::store::UsageRecord;
use crate::store::{ConsideredModel, RequestRow, RoutingLog, SharedStore};

/// How many ranked candidates a routing log keeps.
pub const ROUTING_LOG_CANDIDATES: usize = 3;

/// A routing log waiting for the id of its usage row.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingTrace {
    pub considered_models: Vec<ConsideredModel>,
    pub final_model: String,
    pub reason: String,
}

impl RoutingTrace {
    pub fn new(candidates: &[Model], final_model: &str, reason: &str) -> Self {
        Self {
            considered_models: candidates
                .iter()
                .take(ROUTING_LOG_CANDIDATES)
                .map(|m| ConsideredModel {
                    provider: m.provider.to_string(),
                    model_name: m.model_name.clone(),
                })
                .collect(),
            final_model: final_model.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Writes usage rows off the request path.
#[derive(Clone)]
pub struct UsageRecorder {
    store: SharedStore,
}

impl UsageRecorder {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Spawn the audit write and return immediately.
    ///
    /// Failures are logged and never reach the caller. The routing log is only
    /// written once the usage row exists, since it references that row's id.
    pub fn record(&self, record: UsageRecord, trace: Option<RoutingTrace>) -> JoinHandle<()> {
        let store = self.store.clone();
        tokio::spawn(async move {
            let request_id = match store.insert_request(&record).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(
                        org_id = %record.org_id,
                        model = %record.model_used,
                        "Usage write failed: {}",
                        e
                    );
                    return;
                }
            };

            let (Some(request_id), Some(trace)) = (request_id, trace) else {
                return;
            };
            let log = RoutingLog {
                request_id,
                considered_models: trace.considered_models,
                final_model: trace.final_model,
                reason: trace.reason,
            };
            if let Err(e) = store.insert_routing_log(&log).await {
                warn!(request_id = %log.request_id, "Routing log write failed: {}", e);
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelUsage {
    pub model: String,
    pub count: u64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSummary {
    pub total_requests: u64,
    pub total_cost: f64,
    pub estimated_savings: f64,
    pub by_model: Vec<ModelUsage>,
}

/// Aggregate usage rows. Money is rounded to 8 decimal places; `by_model` is
/// sorted by model name, with missing names grouped under `unknown`.
pub fn summarize(rows: &[RequestRow]) -> UsageSummary {
    let mut total_cost = 0.0;
    let mut baseline = 0.0;
    let mut by_model: BTreeMap<&str, (u64, f64)> = BTreeMap::new();

    for row in rows {
        let cost = row.cost.unwrap_or(0.0);
        total_cost += cost;
        baseline += premium_baseline(
            row.input_tokens.unwrap_or(0),
            row.output_tokens.unwrap_or(0),
        );
        let slot = by_model
            .entry(row.model_used.as_deref().unwrap_or("unknown"))
            .or_insert((0, 0.0));
        slot.0 += 1;
        slot.1 += cost;
    }

    UsageSummary {
        total_requests: rows.len() as u64,
        total_cost: round_money(total_cost),
        estimated_savings: round_money(savings(total_cost, baseline)),
        by_model: by_model
            .into_iter()
            .map(|(model, (count, cost))| ModelUsage {
                model: model.to_string(),
                count,
                cost: round_money(cost),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn row(model: Option<&str>, cost: f64, input: u64, output: u64) -> RequestRow {
        RequestRow {
            model_used: model.map(str::to_string),
            cost: Some(cost),
            success: true,
            input_tokens: Some(input),
            output_tokens: Some(output),
            created_at: None,
        }
    }

    fn record(org: &str) -> UsageRecord {
        UsageRecord {
            org_id: org.into(),
            task_type: "chat".into(),
            model_used: "gpt-4o-mini".into(),
            input_tokens: 100,
            output_tokens: 50,
            cost: 0.000045,
            latency_ms: 320,
            success: true,
        }
    }

    #[test]
    fn test_summarize_groups_and_sorts() {
        let rows = vec![
            row(Some("gpt-4o-mini"), 0.001, 1000, 1000),
            row(Some("claude-3-haiku"), 0.002, 1000, 1000),
            row(Some("gpt-4o-mini"), 0.003, 1000, 1000),
            row(None, 0.0, 0, 0),
        ];
        let summary = summarize(&rows);
        assert_eq!(summary.total_requests, 4);
        assert_eq!(summary.total_cost, 0.006);
        // Baseline 3 * 0.0125 = 0.0375.
        assert_eq!(summary.estimated_savings, 0.0315);
        let models: Vec<&str> = summary.by_model.iter().map(|m| m.model.as_str()).collect();
        assert_eq!(models, ["claude-3-haiku", "gpt-4o-mini", "unknown"]);
        assert_eq!(summary.by_model[1].count, 2);
        assert_eq!(summary.by_model[1].cost, 0.004);
    }

    #[test]
    fn test_savings_never_negative() {
        let summary = summarize(&[row(Some("o1"), 5.0, 10, 10)]);
        assert_eq!(summary.estimated_savings, 0.0);
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.total_cost, 0.0);
        assert!(summary.by_model.is_empty());
    }

    #[test]
    fn test_trace_keeps_top_three() {
        let models: Vec<Model> = (0..5)
            .map(|i| Model {
                model_name: format!("m{}", i),
                ..Model::builtin_default()
            })
            .collect();
        let trace = RoutingTrace::new(&models, "m1", "why");
        assert_eq!(trace.considered_models.len(), 3);
        assert_eq!(trace.considered_models[2].model_name, "m2");
        assert_eq!(trace.considered_models[0].provider, "openai");
    }

    #[tokio::test]
    async fn test_record_writes_usage_then_routing_log() {
        let store = Arc::new(MemoryStore::new());
        let shared: SharedStore = store.clone();
        let recorder = UsageRecorder::new(shared);

        let trace = RoutingTrace::new(&[Model::builtin_default()], "gpt-4o-mini", "task=chat");
        recorder.record(record("org-a"), Some(trace)).await.unwrap();

        assert_eq!(store.requests().await, vec![record("org-a")]);
        let logs = store.routing_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].final_model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_record_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let shared: SharedStore = store.clone();
        let recorder = UsageRecorder::new(shared);

        // The task completes without panicking.
        recorder.record(record("org-a"), None).await.unwrap();
        assert!(store.routing_logs().await.is_empty());
    }
}
