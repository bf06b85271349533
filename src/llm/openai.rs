//! OpenAI-compatible `chat/completions` client (OpenAI, Groq, OpenRouter).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    read_success_body, transport_error, ChatMessage, ChatResponse, LlmClient, LlmError, TokenUsage,
};
use crate::registry::Provider;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Client for any endpoint speaking the OpenAI chat completions format.
pub struct OpenAiCompatibleClient {
    client: Client,
    provider: Provider,
    endpoint: String,
    api_key: String,
}

impl OpenAiCompatibleClient {
    pub fn openai(api_key: String) -> Self {
        Self::with_endpoint(Provider::OpenAi, OPENAI_API_URL, api_key)
    }

    pub fn groq(api_key: String) -> Self {
        Self::with_endpoint(Provider::Groq, GROQ_API_URL, api_key)
    }

    pub fn openrouter(api_key: String) -> Self {
        Self::with_endpoint(Provider::OpenRouter, OPENROUTER_API_URL, api_key)
    }

    /// Point a client at a custom endpoint (proxies, self-hosted gateways).
    pub fn with_endpoint(provider: Provider, endpoint: &str, api_key: String) -> Self {
        Self {
            client: Client::new(),
            provider,
            endpoint: endpoint.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatResponse, LlmError> {
        let request = CompletionRequest { model, messages };

        tracing::debug!(provider = %self.provider, model, "Sending chat completion");

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if self.provider == Provider::OpenRouter {
            builder = builder
                .header("HTTP-Referer", "https://github.com/omni-gateway")
                .header("X-Title", "Omni Gateway");
        }

        let response = builder.json(&request).send().await.map_err(transport_error)?;
        let body = read_success_body(response).await?;
        parse_completion(&body, model)
    }
}

fn parse_completion(body: &str, requested_model: &str) -> Result<ChatResponse, LlmError> {
    let parsed: CompletionResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::parse_error(format!("Failed to parse response: {}, body: {}", e, body))
    })?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::parse_error("No choices in response"))?;

    Ok(ChatResponse {
        content: choice.message.content,
        finish_reason: choice.finish_reason,
        usage: parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
        model: parsed.model.or_else(|| Some(requested_model.to_string())),
    })
}

/// Chat completions request format.
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

/// Chat completions response format.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Usage data (OpenAI-compatible).
#[derive(Debug, Deserialize)]
struct CompletionUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
