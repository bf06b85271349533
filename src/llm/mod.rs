//! LLM client module for calling upstream providers.
//!
//! This module provides a trait-based abstraction over LLM providers. Each
//! provider gets one transport:
//! - OpenAI, Groq, OpenRouter: OpenAI-compatible `chat/completions`
//! - Anthropic: `/v1/messages`
//! - Google: Gemini `generateContent`
//!
//! Transports make exactly one HTTP call per invocation; timeouts, retries and
//! fallback belong to [`crate::dispatch`].

mod anthropic;
mod error;
mod google;
mod openai;

pub use anthropic::AnthropicClient;
pub use error::{classify_http_status, is_retryable_status, LlmError, LlmErrorKind};
pub use google::GoogleClient;
pub use openai::OpenAiCompatibleClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::registry::Provider;

/// Role in a chat conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a simple text message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
        }
    }
}

/// Response from a chat completion.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
    pub model: Option<String>,
}

/// Token usage information (if provided by the upstream provider).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create a usage object ensuring `total_tokens` is consistent.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Trait for LLM clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider this client talks to.
    fn provider(&self) -> Provider;

    /// Send one chat completion request.
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatResponse, LlmError>;
}

/// Map a reqwest transport failure onto an [`LlmError`].
pub(crate) fn transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::timeout(format!("Request timeout: {}", e))
    } else if e.is_connect() {
        LlmError::network_error(format!("Connection failed: {}", e))
    } else {
        LlmError::network_error(format!("Request failed: {}", e))
    }
}

/// Read a response, turning non-2xx statuses into classified errors.
pub(crate) async fn read_success_body(response: reqwest::Response) -> Result<String, LlmError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        return Err(LlmError::from_status(status.as_u16(), body));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        let msg = ChatMessage::new(Role::Assistant, "hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hello"}));
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage::new(u64::MAX, 5);
        assert_eq!(usage.total_tokens, u64::MAX);
        assert_eq!(TokenUsage::new(3, 4).total_tokens, 7);
    }
}
