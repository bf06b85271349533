//! Provider error classification.
//!
//! Every transport failure is reduced to an [`LlmErrorKind`]; the dispatcher
//! only looks at [`LlmError::is_retryable`].

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Connection refused, reset, DNS failure.
    Network,
    /// The call did not finish in time.
    Timeout,
    /// Upstream returned 429.
    RateLimited,
    /// Upstream returned 408 or a retryable 5xx.
    ServerError,
    /// Upstream rejected the request (4xx, 501).
    ClientError,
    /// Response body could not be understood.
    Parse,
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Network => "network error",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate limited",
            Self::ServerError => "server error",
            Self::ClientError => "client error",
            Self::Parse => "parse error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl LlmError {
    fn new(kind: LlmErrorKind, message: String) -> Self {
        Self {
            kind,
            message,
            status: None,
        }
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Network, message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Timeout, message.into())
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Parse, message.into())
    }

    /// Build an error from a non-success HTTP response.
    pub fn from_status(status: u16, body: String) -> Self {
        Self {
            kind: classify_http_status(status),
            message: body,
            status: Some(status),
        }
    }

    /// Whether another attempt against the same model may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            LlmErrorKind::Network
                | LlmErrorKind::Timeout
                | LlmErrorKind::RateLimited
                | LlmErrorKind::ServerError
        )
    }
}

/// 408, 429 and 5xx except 501 are worth retrying.
pub fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || ((500..600).contains(&status) && status != 501)
}

pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        s if is_retryable_status(s) => LlmErrorKind::ServerError,
        _ => LlmErrorKind::ClientError,
    }
}
