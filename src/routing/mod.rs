//! Routing module - decides which models serve a request, and in what order.
//!
//! # Key Concepts
//! - Task type: coarse category from [`classify`], matched against model strengths
//! - Priority: the ranking policy (`cheap`, `balanced`, `best`, `quality`)
//! - Candidates: the full ranked list; index 0 is primary, the rest are fallbacks
//!
//! Ranking is pure ([`rank_models`]); [`RoutingEngine`] only adds the cached registry.

mod classifier;
mod engine;
mod scorer;

pub use classifier::{classify, classify_text, TaskType};
pub use engine::RoutingEngine;
pub use scorer::{estimated_cost, rank_models, task_match};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::budget::TokenEstimate;
use crate::registry::{Model, Provider};

/// Ranking policy requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Cheap,
    #[default]
    Balanced,
    Best,
    Quality,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cheap => "cheap",
            Self::Balanced => "balanced",
            Self::Best => "best",
            Self::Quality => "quality",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cheap" => Ok(Self::Cheap),
            "balanced" => Ok(Self::Balanced),
            "best" => Ok(Self::Best),
            "quality" => Ok(Self::Quality),
            _ => Err("expected one of: cheap, balanced, best, quality".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyPref {
    Fast,
    #[default]
    Normal,
}

impl LatencyPref {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Normal => "normal",
        }
    }
}

impl fmt::Display for LatencyPref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LatencyPref {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(Self::Fast),
            "normal" => Ok(Self::Normal),
            _ => Err("expected one of: fast, normal".to_string()),
        }
    }
}

/// Inputs to one routing decision.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingRequest {
    pub task_type: TaskType,
    pub priority: Priority,
    pub latency_pref: LatencyPref,
    /// Upper bound on estimated cost; only enforced together with `token_estimate`.
    pub max_cost: Option<f64>,
    pub token_estimate: Option<TokenEstimate>,
    /// Restrict candidates to these providers. `None` means no restriction.
    pub available_providers: Option<Vec<Provider>>,
}

impl RoutingRequest {
    pub fn new(task_type: TaskType, priority: Priority, latency_pref: LatencyPref) -> Self {
        Self {
            task_type,
            priority,
            latency_pref,
            max_cost: None,
            token_estimate: None,
            available_providers: None,
        }
    }

    pub fn with_max_cost(mut self, max_cost: Option<f64>) -> Self {
        self.max_cost = max_cost;
        self
    }

    pub fn with_token_estimate(mut self, estimate: TokenEstimate) -> Self {
        self.token_estimate = Some(estimate);
        self
    }

    pub fn with_providers(mut self, providers: Vec<Provider>) -> Self {
        self.available_providers = Some(providers);
        self
    }

    /// `task=..., priority=..., latency=...`, the common prefix of every reason string.
    fn describe(&self) -> String {
        format!(
            "task={}, priority={}, latency={}",
            self.task_type, self.priority, self.latency_pref
        )
    }
}

/// Ranked candidates plus a human-readable account of how they were chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub candidates: Vec<Model>,
    pub reason: String,
}

impl RoutingDecision {
    pub(crate) fn new(request: &RoutingRequest, candidates: Vec<Model>) -> Self {
        let reason = match candidates.first() {
            Some(primary) => format!(
                "{}, primary={}",
                request.describe(),
                primary.qualified_name()
            ),
            None => format!("{}, no eligible models", request.describe()),
        };
        Self { candidates, reason }
    }

    pub fn primary(&self) -> Option<&Model> {
        self.candidates.first()
    }

    pub fn fallbacks(&self) -> &[Model] {
        self.candidates.get(1..).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_defaults() {
        assert_eq!(Priority::default(), Priority::Balanced);
        assert_eq!(LatencyPref::default(), LatencyPref::Normal);
    }

    #[test]
    fn test_parse_priority() {
        assert_eq!("quality".parse::<Priority>().unwrap(), Priority::Quality);
        assert!("fastest".parse::<Priority>().is_err());
        assert!("FAST".parse::<LatencyPref>().is_err());
    }

    #[test]
    fn test_decision_reason_and_fallbacks() {
        let request = RoutingRequest::new(TaskType::Coding, Priority::Best, LatencyPref::Fast);
        let primary = Model::builtin_default();
        let backup = Model {
            model_name: "gpt-4o".into(),
            ..Model::builtin_default()
        };
        let decision = RoutingDecision::new(&request, vec![primary, backup]);
        assert_eq!(
            decision.reason,
            "task=coding, priority=best, latency=fast, primary=openai/gpt-4o-mini"
        );
        assert_eq!(decision.fallbacks().len(), 1);
        assert_eq!(decision.fallbacks()[0].model_name, "gpt-4o");

        let empty = RoutingDecision::new(&request, Vec::new());
        assert!(empty.primary().is_none());
        assert!(empty.fallbacks().is_empty());
    }
}
