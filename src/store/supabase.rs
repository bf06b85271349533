//! Supabase (PostgREST) implementation of [`GatewayStore`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

use super::{
    ApiKeyRecord, GatewayStore, RequestRow, RoutingLog, StoreError, UsageRange, UsageRecord,
};
use crate::registry::{Model, Provider};

const STORE_TIMEOUT: Duration = Duration::from_secs(10);

const MODEL_COLUMNS: &str = concat!(
    "id,provider,model_name,cost_input,cost_output,avg_latency,strengths,",
    "quality_rating,speed_index,price_index,deprecated"
);
const REQUEST_COLUMNS: &str = "model_used,cost,success,input_tokens,output_tokens,created_at";

/// Supabase client for the gateway tables.
pub struct SupabaseStore {
    client: Client,
    url: String,
    service_role_key: String,
}

impl SupabaseStore {
    pub fn new(url: &str, service_role_key: &str) -> Self {
        let client = Client::builder()
            .timeout(STORE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        }
    }

    /// Get the PostgREST URL.
    fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
    }

    async fn get_rows<T>(&self, path: &str) -> Result<Vec<T>, StoreError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let resp = self
            .authorized(self.client.get(format!("{}/{}", self.rest_url(), path)))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// `models` row as PostgREST returns it.
#[derive(Debug, Deserialize)]
struct DbModel {
    id: serde_json::Value,
    provider: String,
    model_name: String,
    cost_input: Option<f64>,
    cost_output: Option<f64>,
    avg_latency: Option<f64>,
    strengths: Option<Vec<String>>,
    quality_rating: Option<f64>,
    speed_index: Option<f64>,
    price_index: Option<f64>,
    deprecated: Option<bool>,
}

impl DbModel {
    fn into_model(self) -> Option<Model> {
        let provider = match self.provider.parse::<Provider>() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(model = %self.model_name, "Skipping registry row: {}", e);
                return None;
            }
        };
        let id = match self.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Some(Model {
            id,
            provider,
            model_name: self.model_name,
            cost_input: self.cost_input.unwrap_or(0.0).max(0.0),
            cost_output: self.cost_output.unwrap_or(0.0).max(0.0),
            avg_latency: self.avg_latency.unwrap_or(0.0),
            strengths: self.strengths.unwrap_or_default(),
            quality_rating: self.quality_rating,
            speed_index: self.speed_index,
            price_index: self.price_index,
            deprecated: self.deprecated.unwrap_or(false),
        })
    }
}

#[derive(Debug, Deserialize)]
struct InsertedId {
    id: serde_json::Value,
}

#[async_trait]
impl GatewayStore for SupabaseStore {
    async fn fetch_models(&self) -> Result<Vec<Model>, StoreError> {
        let rows: Vec<DbModel> = self
            .get_rows(&format!("models?select={}", MODEL_COLUMNS))
            .await?;
        Ok(rows.into_iter().filter_map(DbModel::into_model).collect())
    }

    async fn find_api_keys_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<ApiKeyRecord>, StoreError> {
        self.get_rows(&format!(
            "users?select=id,org_id,api_key_hash&api_key_prefix=eq.{}",
            urlencoding::encode(prefix)
        ))
        .await
    }

    async fn insert_request(&self, record: &UsageRecord) -> Result<Option<String>, StoreError> {
        let body = serde_json::json!({
            "org_id": record.org_id,
            "task_type": record.task_type,
            "model_used": record.model_used,
            "input_tokens": record.input_tokens,
            "output_tokens": record.output_tokens,
            "tokens": record.total_tokens(),
            "cost": record.cost,
            "latency_ms": record.latency_ms,
            "success": record.success,
        });

        let resp = self
            .authorized(self.client.post(format!("{}/requests", self.rest_url())))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let rows: Vec<InsertedId> = serde_json::from_str(&text)?;
        Ok(rows.into_iter().next().map(|r| match r.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        }))
    }

    async fn insert_routing_log(&self, log: &RoutingLog) -> Result<(), StoreError> {
        let resp = self
            .authorized(self.client.post(format!("{}/routing_logs", self.rest_url())))
            .header("Content-Type", "application/json")
            .json(log)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            return Err(StoreError::Status { status, body });
        }
        Ok(())
    }

    async fn list_requests(
        &self,
        org_id: &str,
        range: &UsageRange,
    ) -> Result<Vec<RequestRow>, StoreError> {
        let mut path = format!(
            "requests?select={}&org_id=eq.{}",
            REQUEST_COLUMNS,
            urlencoding::encode(org_id)
        );
        if let Some(from) = range.from {
            path.push_str(&format!(
                "&created_at=gte.{}",
                urlencoding::encode(&from.to_rfc3339())
            ));
        }
        if let Some(to) = range.to {
            path.push_str(&format!(
                "&created_at=lte.{}",
                urlencoding::encode(&to.to_rfc3339())
            ));
        }
        self.get_rows(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_model_conversion() {
        let row: DbModel = serde_json::from_value(serde_json::json!({
            "id": 7,
            "provider": "anthropic",
            "model_name": "claude-3-5-haiku-20241022",
            "cost_input": 0.0008,
            "cost_output": 0.004,
            "avg_latency": null,
            "strengths": ["chat", "summarization"],
            "quality_rating": 80,
            "speed_index": null,
            "price_index": null,
            "deprecated": null
        }))
        .unwrap();

        let model = row.into_model().unwrap();
        assert_eq!(model.id, "7");
        assert_eq!(model.provider, Provider::Anthropic);
        assert_eq!(model.avg_latency, 0.0);
        assert_eq!(model.quality_rating, Some(80.0));
        assert!(!model.deprecated);
    }

    #[test]
    fn test_unknown_provider_row_is_skipped() {
        let row: DbModel = serde_json::from_value(serde_json::json!({
            "id": "x",
            "provider": "mistral",
            "model_name": "mistral-large",
            "cost_input": 0.002,
            "cost_output": 0.006,
            "avg_latency": 500,
            "strengths": null,
            "quality_rating": null,
            "speed_index": null,
            "price_index": null,
            "deprecated": false
        }))
        .unwrap();
        assert!(row.into_model().is_none());
    }

    #[test]
    fn test_rest_url_trims_trailing_slash() {
        let store = SupabaseStore::new("https://example.supabase.co/", "key");
        assert_eq!(store.rest_url(), "https://example.supabase.co/rest/v1");
    }
}
