//! Multi-criteria model ranking.
//!
//! `cheap` and `best` use explicit comparator chains; `balanced` and `quality`
//! sort by a weighted score over normalized cost, latency, task match and
//! quality rating. All sorts are stable, so registry order breaks exact ties.

use std::cmp::Ordering;

use super::{LatencyPref, Priority, RoutingRequest, TaskType};
use crate::budget::{self, TokenEstimate};
use crate::registry::Model;

/// Quality used when a model has no `quality_rating`.
const DEFAULT_QUALITY_RATING: f64 = 50.0;

#[derive(Debug, Clone, Copy)]
struct Weights {
    cost: f64,
    latency: f64,
    task: f64,
    quality: f64,
}

impl Weights {
    fn for_request(priority: Priority, latency_pref: LatencyPref) -> Self {
        match (priority, latency_pref) {
            (Priority::Quality, _) => Self {
                cost: 0.10,
                latency: 0.20,
                task: 0.30,
                quality: 0.40,
            },
            (_, LatencyPref::Fast) => Self {
                cost: 0.30,
                latency: 0.35,
                task: 0.25,
                quality: 0.10,
            },
            (_, LatencyPref::Normal) => Self {
                cost: 0.35,
                latency: 0.25,
                task: 0.30,
                quality: 0.10,
            },
        }
    }
}

#[derive(Debug)]
struct Scored<'a> {
    model: &'a Model,
    estimated_cost: f64,
    task_match: f64,
    score: f64,
}

/// Estimated request cost on `model`.
///
/// Without a token estimate this is `cost_input + cost_output`, which only
/// orders models relative to each other.
pub fn estimated_cost(model: &Model, tokens: Option<&TokenEstimate>) -> f64 {
    match tokens {
        Some(t) => budget::cost(model, t.input_tokens, t.output_tokens),
        None => model.cost_input + model.cost_output,
    }
}

/// 1.0 for an exact strength match, 0.5 for generic chat capability, else 0.
pub fn task_match(model: &Model, task: TaskType) -> f64 {
    if model.has_strength(task.as_str()) {
        1.0
    } else if model.has_strength(TaskType::Chat.as_str()) {
        0.5
    } else {
        0.0
    }
}

/// Map `value` into `[0, 1]` with the minimum at 1. A degenerate range maps to 1.
fn normalize_inverse(value: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        return 1.0;
    }
    1.0 - ((value - min) / (max - min)).clamp(0.0, 1.0)
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

fn latency_if_fast(a: &Scored<'_>, b: &Scored<'_>, pref: LatencyPref) -> Ordering {
    match pref {
        LatencyPref::Fast => a.model.avg_latency.total_cmp(&b.model.avg_latency),
        LatencyPref::Normal => Ordering::Equal,
    }
}

fn cheap_order(a: &Scored<'_>, b: &Scored<'_>, pref: LatencyPref) -> Ordering {
    a.estimated_cost
        .total_cmp(&b.estimated_cost)
        .then_with(|| latency_if_fast(a, b, pref))
        .then_with(|| b.task_match.total_cmp(&a.task_match))
        .then_with(|| a.model.avg_latency.total_cmp(&b.model.avg_latency))
}

// Equal match and speed prefers the more expensive model.
fn best_order(a: &Scored<'_>, b: &Scored<'_>, pref: LatencyPref) -> Ordering {
    b.task_match
        .total_cmp(&a.task_match)
        .then_with(|| latency_if_fast(a, b, pref))
        .then_with(|| b.estimated_cost.total_cmp(&a.estimated_cost))
        .then_with(|| a.model.avg_latency.total_cmp(&b.model.avg_latency))
}

/// Rank `models` for `request`, dropping anything ineligible.
///
/// Returns an empty list when nothing survives filtering; never fails.
pub fn rank_models(models: &[Model], request: &RoutingRequest) -> Vec<Model> {
    let tokens = request.token_estimate.as_ref();

    let mut scored: Vec<Scored<'_>> = models
        .iter()
        .filter(|m| !m.deprecated)
        .filter(|m| match &request.available_providers {
            Some(providers) => providers.contains(&m.provider),
            None => true,
        })
        .map(|model| Scored {
            model,
            estimated_cost: estimated_cost(model, tokens),
            task_match: task_match(model, request.task_type),
            score: 0.0,
        })
        .collect();

    if let (Some(max_cost), Some(_)) = (request.max_cost, tokens) {
        scored.retain(|s| s.estimated_cost <= max_cost);
    }
    if scored.is_empty() {
        return Vec::new();
    }

    let (cost_min, cost_max) = bounds(scored.iter().map(|s| s.estimated_cost));
    let (lat_min, lat_max) = bounds(scored.iter().map(|s| s.model.avg_latency));
    let weights = Weights::for_request(request.priority, request.latency_pref);

    for s in &mut scored {
        let cost_norm = normalize_inverse(s.estimated_cost, cost_min, cost_max);
        let latency_norm = normalize_inverse(s.model.avg_latency, lat_min, lat_max);
        let quality_norm = s.model.quality_rating.unwrap_or(DEFAULT_QUALITY_RATING) / 100.0;
        s.score = weights.cost * cost_norm
            + weights.latency * latency_norm
            + weights.task * s.task_match
            + weights.quality * quality_norm;
    }

    let pref = request.latency_pref;
    match request.priority {
        Priority::Cheap => scored.sort_by(|a, b| cheap_order(a, b, pref)),
        Priority::Best => scored.sort_by(|a, b| best_order(a, b, pref)),
        Priority::Balanced | Priority::Quality => {
            scored.sort_by(|a, b| b.score.total_cmp(&a.score))
        }
    }

    scored.into_iter().map(|s| s.model.clone()).collect()
}
