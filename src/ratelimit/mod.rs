//! Fixed-window rate limiting per tenant.
//!
//! Counters live in Upstash Redis when it is configured, otherwise (or when a
//! call to it fails) in an in-process [`MemoryCounter`] with identical
//! semantics.

mod memory;
mod upstash;

pub use memory::{MemoryCounter, MAX_WINDOW};
pub use upstash::{UpstashCounter, UpstashError, WindowCount};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::Config;

/// How often the in-process store drops finished windows.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub ok: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_seconds: u64,
}

#[derive(Clone)]
pub struct RateLimiter {
    limit: u64,
    window_seconds: u64,
    upstash: Option<UpstashCounter>,
    memory: Arc<MemoryCounter>,
}

impl RateLimiter {
    /// In-process limiter. A `limit` or `window_seconds` of 0 disables limiting.
    pub fn new(limit: u64, window_seconds: u64) -> Self {
        Self {
            limit,
            window_seconds,
            upstash: None,
            memory: Arc::new(MemoryCounter::new()),
        }
    }

    pub fn with_upstash(mut self, upstash: UpstashCounter) -> Self {
        self.upstash = Some(upstash);
        self
    }

    pub fn from_config(config: &Config) -> Self {
        let limiter = Self::new(config.rate_limit_max, config.rate_limit_window_secs);
        match &config.upstash {
            Some(upstash) => {
                limiter.with_upstash(UpstashCounter::new(&upstash.url, &upstash.token))
            }
            None => limiter,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0 && self.window_seconds > 0
    }

    pub fn is_distributed(&self) -> bool {
        self.upstash.is_some()
    }

    /// Count a request against `key`. `None` when limiting is disabled.
    pub async fn check(&self, key: &str) -> Option<RateLimitDecision> {
        if !self.is_enabled() {
            return None;
        }
        let key = format!("ratelimit:{}", key);

        if let Some(upstash) = &self.upstash {
            match upstash.increment(&key, self.window_seconds).await {
                Ok(WindowCount { count, ttl_seconds }) => {
                    return Some(RateLimitDecision {
                        ok: count <= self.limit,
                        limit: self.limit,
                        remaining: self.limit.saturating_sub(count),
                        reset_seconds: ttl_seconds,
                    });
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        "Distributed rate limit check failed, falling back to memory"
                    );
                }
            }
        }

        let decision = self.memory.check(
            &key,
            self.limit,
            Duration::from_secs(self.window_seconds),
        );
        debug!(key = %key, ok = decision.ok, remaining = decision.remaining, "Rate limit checked");
        Some(decision)
    }

    /// Periodically prune finished in-process windows.
    pub fn spawn_janitor(&self) -> JoinHandle<()> {
        let memory = Arc::clone(&self.memory);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                memory.prune_expired(Instant::now());
            }
        })
    }
}
