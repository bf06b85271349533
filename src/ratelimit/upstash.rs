//! Upstash Redis REST counter.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const UPSTASH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum UpstashError {
    #[error("upstash request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstash returned status {0}")]
    Status(u16),
    #[error("unexpected upstash response: {0}")]
    Decode(String),
}

#[derive(Debug, Deserialize)]
struct PipelineEntry {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Count and TTL after one `INCR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    pub count: u64,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct UpstashCounter {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl UpstashCounter {
    pub fn new(url: &str, token: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(UPSTASH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// `INCR key; EXPIRE key window NX; TTL key` as one pipeline.
    ///
    /// Not linearizable near window edges: the expiry is first-writer-wins and
    /// the count is read separately from the TTL.
    pub async fn increment(
        &self,
        key: &str,
        window_seconds: u64,
    ) -> Result<WindowCount, UpstashError> {
        let commands = json!([
            ["INCR", key],
            ["EXPIRE", key, window_seconds, "NX"],
            ["TTL", key],
        ]);

        let response = self
            .client
            .post(format!("{}/pipeline", self.url))
            .bearer_auth(&self.token)
            .json(&commands)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstashError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        parse_pipeline(&body, window_seconds)
    }
}

fn as_i64(entry: Option<&PipelineEntry>) -> Option<i64> {
    let value = entry?.result.as_ref()?;
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

pub(crate) fn parse_pipeline(body: &str, window_seconds: u64) -> Result<WindowCount, UpstashError> {
    let entries: Vec<PipelineEntry> =
        serde_json::from_str(body).map_err(|e| UpstashError::Decode(e.to_string()))?;

    if let Some(err) = entries.iter().find_map(|e| e.error.as_deref()) {
        return Err(UpstashError::Decode(err.to_string()));
    }

    let count = as_i64(entries.first())
        .ok_or_else(|| UpstashError::Decode("missing INCR result".to_string()))?;
    let ttl = as_i64(entries.get(2)).unwrap_or(window_seconds as i64);

    Ok(WindowCount {
        count: count.max(0) as u64,
        ttl_seconds: if ttl > 0 { ttl as u64 } else { window_seconds },
    })
}
