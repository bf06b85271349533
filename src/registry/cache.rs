//! Time-bounded cache in front of the `models` table.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::Model;
use crate::store::SharedStore;

/// How long a fetched registry snapshot is served before refreshing.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct Snapshot {
    models: Arc<[Model]>,
    fetched_at: Instant,
}

/// Registry cache with copy-on-refresh semantics.
///
/// Readers clone an `Arc` to an immutable snapshot; a refresh builds a new
/// snapshot off-lock and swaps the pointer. Concurrent callers that observe an
/// expired snapshot may each fetch; the last write wins.
pub struct ModelCache {
    store: SharedStore,
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

impl ModelCache {
    pub fn new(store: SharedStore) -> Self {
        Self::with_ttl(store, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(store: SharedStore, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            snapshot: RwLock::new(None),
        }
    }

    /// Current registry contents.
    ///
    /// Refreshes at most once per TTL. A failed or empty fetch serves the
    /// previous snapshot when one exists, and an empty list otherwise.
    pub async fn get_models(&self) -> Arc<[Model]> {
        let stale = {
            let guard = self.snapshot.read().await;
            match guard.as_ref() {
                Some(snap) if snap.fetched_at.elapsed() < self.ttl => {
                    return Arc::clone(&snap.models);
                }
                Some(snap) => Some(Arc::clone(&snap.models)),
                None => None,
            }
        };

        match self.store.fetch_models().await {
            Ok(models) if !models.is_empty() => {
                let models: Arc<[Model]> = models.into();
                *self.snapshot.write().await = Some(Snapshot {
                    models: Arc::clone(&models),
                    fetched_at: Instant::now(),
                });
                tracing::debug!(count = models.len(), "Model registry refreshed");
                models
            }
            Ok(_) => {
                tracing::warn!("Model registry returned no rows");
                stale.unwrap_or_else(|| Arc::from(Vec::new()))
            }
            Err(e) => {
                tracing::warn!(
                    serving_stale = stale.is_some(),
                    "Model registry refresh failed: {}",
                    e
                );
                stale.unwrap_or_else(|| Arc::from(Vec::new()))
            }
        }
    }

    /// Force the next [`get_models`](Self::get_models) call to hit the store.
    pub async fn invalidate(&self) {
        *self.snapshot.write().await = None;
        tracing::info!("Model registry cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Provider;
    use crate::store::MemoryStore;

    fn model(name: &str) -> Model {
        Model {
            id: name.to_string(),
            provider: Provider::OpenAi,
            model_name: name.to_string(),
            cost_input: 0.001,
            cost_output: 0.002,
            avg_latency: 400.0,
            strengths: vec!["chat".to_string()],
            quality_rating: None,
            speed_index: None,
            price_index: None,
            deprecated: false,
        }
    }

    #[tokio::test]
    async fn test_serves_cached_snapshot_within_ttl() {
        let store = Arc::new(MemoryStore::with_models(vec![model("a")]));
        let cache = ModelCache::new(store.clone());

        assert_eq!(cache.get_models().await.len(), 1);
        store.set_models(vec![model("a"), model("b")]).await;
        assert_eq!(cache.get_models().await.len(), 1);
        assert_eq!(store.model_fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let store = Arc::new(MemoryStore::with_models(vec![model("a")]));
        let cache = ModelCache::new(store.clone());

        cache.get_models().await;
        store.set_models(vec![model("a"), model("b")]).await;
        cache.invalidate().await;

        assert_eq!(cache.get_models().await.len(), 2);
        assert_eq!(store.model_fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_serves_stale_when_refresh_fails() {
        let store = Arc::new(MemoryStore::with_models(vec![model("a")]));
        let cache = ModelCache::with_ttl(store.clone(), Duration::ZERO);

        assert_eq!(cache.get_models().await.len(), 1);
        store.set_unavailable(true);
        let models = cache.get_models().await;
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].model_name, "a");
    }

    #[tokio::test]
    async fn test_empty_when_store_down_and_nothing_cached() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let cache = ModelCache::new(store);
        assert!(cache.get_models().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_complete_snapshots() {
        let store = Arc::new(MemoryStore::with_models(vec![model("a"), model("b")]));
        let cache = Arc::new(ModelCache::with_ttl(store, Duration::ZERO));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_models().await.len() })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 2);
        }
    }
}
