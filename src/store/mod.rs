//! Persistence boundary.
//!
//! The gateway talks to a relational store with four tables (`models`, `users`,
//! `requests`, `routing_logs`). [`GatewayStore`] is the only seam through which
//! the core touches it; production uses [`SupabaseStore`] (PostgREST), tests use
//! [`MemoryStore`].

mod memory;
mod supabase;
mod types;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;
pub use types::{ApiKeyRecord, ConsideredModel, RequestRow, RoutingLog, UsageRange, UsageRecord};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::registry::Model;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read/write access to the gateway's tables.
#[async_trait]
pub trait GatewayStore: Send + Sync {
    /// All registry rows, deprecated ones included.
    async fn fetch_models(&self) -> Result<Vec<Model>, StoreError>;

    /// Key records whose indexed prefix equals `prefix`.
    async fn find_api_keys_by_prefix(&self, prefix: &str)
        -> Result<Vec<ApiKeyRecord>, StoreError>;

    /// Append a usage row, returning its id when the store reports one.
    async fn insert_request(&self, record: &UsageRecord) -> Result<Option<String>, StoreError>;

    async fn insert_routing_log(&self, log: &RoutingLog) -> Result<(), StoreError>;

    /// Usage rows for one org inside an optional time range.
    async fn list_requests(
        &self,
        org_id: &str,
        range: &UsageRange,
    ) -> Result<Vec<RequestRow>, StoreError>;
}

pub type SharedStore = Arc<dyn GatewayStore>;
