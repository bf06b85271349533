//! In-process [`GatewayStore`] for tests and local development.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    ApiKeyRecord, GatewayStore, RequestRow, RoutingLog, StoreError, UsageRange, UsageRecord,
};
use crate::registry::Model;

#[derive(Debug, Clone)]
struct StoredRequest {
    id: String,
    record: UsageRecord,
    created_at: DateTime<Utc>,
}

/// Store backed by in-memory vectors.
///
/// `set_unavailable(true)` makes every call fail, which is how tests exercise
/// the "storage is down" paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    models: RwLock<Vec<Model>>,
    keys: RwLock<Vec<(String, ApiKeyRecord)>>,
    requests: RwLock<Vec<StoredRequest>>,
    routing_logs: RwLock<Vec<RoutingLog>>,
    unavailable: AtomicBool,
    model_fetches: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_models(models: Vec<Model>) -> Self {
        Self {
            models: RwLock::new(models),
            ..Self::default()
        }
    }

    pub async fn set_models(&self, models: Vec<Model>) {
        *self.models.write().await = models;
    }

    /// Register a key record under its lookup prefix.
    pub async fn insert_api_key(&self, prefix: &str, record: ApiKeyRecord) {
        self.keys.write().await.push((prefix.to_string(), record));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `fetch_models` calls served so far.
    pub fn model_fetch_count(&self) -> usize {
        self.model_fetches.load(Ordering::SeqCst)
    }

    pub async fn requests(&self) -> Vec<UsageRecord> {
        self.requests
            .read()
            .await
            .iter()
            .map(|r| r.record.clone())
            .collect()
    }

    pub async fn routing_logs(&self) -> Vec<RoutingLog> {
        self.routing_logs.read().await.clone()
    }

    /// Insert a usage row with an explicit timestamp.
    pub async fn insert_request_at(&self, record: UsageRecord, created_at: DateTime<Utc>) {
        self.requests.write().await.push(StoredRequest {
            id: Uuid::new_v4().to_string(),
            record,
            created_at,
        });
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl GatewayStore for MemoryStore {
    async fn fetch_models(&self) -> Result<Vec<Model>, StoreError> {
        self.model_fetches.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.models.read().await.clone())
    }

    async fn find_api_keys_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<ApiKeyRecord>, StoreError> {
        self.check_available()?;
        Ok(self
            .keys
            .read()
            .await
            .iter()
            .filter(|(p, _)| p == prefix)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn insert_request(&self, record: &UsageRecord) -> Result<Option<String>, StoreError> {
        self.check_available()?;
        let id = Uuid::new_v4().to_string();
        self.requests.write().await.push(StoredRequest {
            id: id.clone(),
            record: record.clone(),
            created_at: Utc::now(),
        });
        Ok(Some(id))
    }

    async fn insert_routing_log(&self, log: &RoutingLog) -> Result<(), StoreError> {
        self.check_available()?;
        let requests = self.requests.read().await;
        if !requests.iter().any(|r| r.id == log.request_id) {
            return Err(StoreError::Status {
                status: 409,
                body: format!("unknown request id {}", log.request_id),
            });
        }
        drop(requests);
        self.routing_logs.write().await.push(log.clone());
        Ok(())
    }

    async fn list_requests(
        &self,
        org_id: &str,
        range: &UsageRange,
    ) -> Result<Vec<RequestRow>, StoreError> {
        self.check_available()?;
        Ok(self
            .requests
            .read()
            .await
            .iter()
            .filter(|r| r.record.org_id == org_id && range.contains(r.created_at))
            .map(|r| RequestRow {
                model_used: Some(r.record.model_used.clone()),
                cost: Some(r.record.cost),
                success: r.record.success,
                input_tokens: Some(r.record.input_tokens),
                output_tokens: Some(r.record.output_tokens),
                created_at: Some(r.created_at),
            })
            .collect())
    }
}
