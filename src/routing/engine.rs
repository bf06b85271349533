use std::sync::Arc;

use super::{rank_models, RoutingDecision, RoutingRequest};
use crate::registry::{Model, ModelCache};

/// Ranks the cached registry for each request.
#[derive(Clone)]
pub struct RoutingEngine {
    cache: Arc<ModelCache>,
}

impl RoutingEngine {
    pub fn new(cache: Arc<ModelCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    /// Ordered candidates for `request`; empty when nothing qualifies.
    pub async fn select_models(&self, request: &RoutingRequest) -> Vec<Model> {
        let models = self.cache.get_models().await;
        rank_models(&models, request)
    }

    pub async fn decide(&self, request: &RoutingRequest) -> RoutingDecision {
        let candidates = self.select_models(request).await;
        let decision = RoutingDecision::new(request, candidates);
        tracing::debug!(
            candidates = decision.candidates.len(),
            reason = %decision.reason,
            "Routing decision"
        );
        decision
    }
}
