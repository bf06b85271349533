//! Timeout + bounded retry for a single provider call.
//!
//! Each call walks a small state machine:
//!
//! ```text
//! Pending --ok--> done
//!    |
//!    +--(error | timeout)--> Failed --non-retryable or out of retries--> done
//!                               |
//!                               +--retry--> Backoff --sleep--> Pending
//! ```
//!
//! Candidate fallback is layered on top of this in [`super::Dispatcher`].

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::LlmError;

/// Per-call timeout and retry bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub retries: u32,
    pub min_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 2,
            min_retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(3),
        }
    }
}

impl CallPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.provider_timeout,
            retries: config.provider_retries,
            min_retry_delay: config.provider_retry_min,
            max_retry_delay: config.provider_retry_max,
        }
    }

    /// No waiting between retries. Used by tests.
    pub fn immediate(timeout: Duration, retries: u32) -> Self {
        Self {
            timeout,
            retries,
            min_retry_delay: Duration::ZERO,
            max_retry_delay: Duration::ZERO,
        }
    }

    /// Uniform random delay in `[min_retry_delay, max_retry_delay]`.
    fn retry_delay(&self) -> Duration {
        let lo = self.min_retry_delay.as_millis() as u64;
        let hi = (self.max_retry_delay.as_millis() as u64).max(lo);
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }
}

enum AttemptState {
    Pending,
    Failed(LlmError),
    Backoff(Duration),
}

/// Run `op` under `policy`, returning the first success or the final error.
///
/// Timeouts count as retryable failures. A non-retryable error ends the loop
/// immediately regardless of remaining retries.
pub async fn call_with_retry<T, F, Fut>(
    policy: &CallPolicy,
    label: &str,
    mut op: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt: u32 = 0;
    let mut retries_left = policy.retries;
    let mut state = AttemptState::Pending;

    loop {
        state = match state {
            AttemptState::Pending => {
                attempt += 1;
                match tokio::time::timeout(policy.timeout, op()).await {
                    Ok(Ok(value)) => {
                        if attempt > 1 {
                            debug!(target_model = label, attempt, "Call succeeded after retries");
                        }
                        return Ok(value);
                    }
                    Ok(Err(e)) => AttemptState::Failed(e),
                    Err(_) => AttemptState::Failed(LlmError::timeout(format!(
                        "{} timed out after {}ms",
                        label,
                        policy.timeout.as_millis()
                    ))),
                }
            }
            AttemptState::Failed(e) => {
                warn!(
                    target_model = label,
                    attempt,
                    retries_left,
                    error = %e,
                    "Provider attempt failed"
                );
                if !e.is_retryable() || retries_left == 0 {
                    return Err(e);
                }
                retries_left -= 1;
                AttemptState::Backoff(policy.retry_delay())
            }
            AttemptState::Backoff(delay) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                AttemptState::Pending
            }
        };
    }
}
