//! Provider dispatch: call ranked candidates in order until one succeeds.
//!
//! Two independent layers:
//! - [`call_with_retry`] bounds a single candidate (timeout, retries, delay)
//! - [`Dispatcher::dispatch`] walks the candidate list, moving on when a
//!   candidate's budget is exhausted
//!
//! Provider identity maps to a transport through [`ProviderSet`], a fixed
//! table with one slot per [`Provider`].

mod retry;

pub use retry::{call_with_retry, CallPolicy};

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::budget::estimate_tokens_from_text;
use crate::config::Config;
use crate::llm::{
    AnthropicClient, ChatMessage, GoogleClient, LlmClient, LlmError, OpenAiCompatibleClient,
};
use crate::registry::{Model, Provider};

/// One optional transport per provider.
#[derive(Clone, Default)]
pub struct ProviderSet {
    openai: Option<Arc<dyn LlmClient>>,
    anthropic: Option<Arc<dyn LlmClient>>,
    google: Option<Arc<dyn LlmClient>>,
    groq: Option<Arc<dyn LlmClient>>,
    openrouter: Option<Arc<dyn LlmClient>>,
}

impl ProviderSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build transports for every provider with a configured credential.
    pub fn from_config(config: &Config) -> Self {
        let mut set = Self::empty();
        for provider in Provider::ALL {
            let Some(key) = config.provider_key(provider) else {
                continue;
            };
            let key = key.to_string();
            let client: Arc<dyn LlmClient> = match provider {
                Provider::OpenAi => Arc::new(OpenAiCompatibleClient::openai(key)),
                Provider::Groq => Arc::new(OpenAiCompatibleClient::groq(key)),
                Provider::OpenRouter => Arc::new(OpenAiCompatibleClient::openrouter(key)),
                Provider::Anthropic => Arc::new(AnthropicClient::new(key)),
                Provider::Google => Arc::new(GoogleClient::new(key)),
            };
            set = set.with(provider, client);
        }
        set
    }

    pub fn with(mut self, provider: Provider, client: Arc<dyn LlmClient>) -> Self {
        *self.slot_mut(provider) = Some(client);
        self
    }

    fn slot_mut(&mut self, provider: Provider) -> &mut Option<Arc<dyn LlmClient>> {
        match provider {
            Provider::OpenAi => &mut self.openai,
            Provider::Anthropic => &mut self.anthropic,
            Provider::Google => &mut self.google,
            Provider::Groq => &mut self.groq,
            Provider::OpenRouter => &mut self.openrouter,
        }
    }

    pub fn client(&self, provider: Provider) -> Option<&Arc<dyn LlmClient>> {
        match provider {
            Provider::OpenAi => self.openai.as_ref(),
            Provider::Anthropic => self.anthropic.as_ref(),
            Provider::Google => self.google.as_ref(),
            Provider::Groq => self.groq.as_ref(),
            Provider::OpenRouter => self.openrouter.as_ref(),
        }
    }

    /// Providers with a transport, in [`Provider::ALL`] order.
    pub fn configured(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.client(*p).is_some())
            .collect()
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        self.client(provider).is_some()
    }
}

/// A successful dispatch.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// The candidate that answered.
    pub model: Model,
    /// Qualified names of every candidate tried, in order, including the winner.
    pub attempted: Vec<String>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("All providers failed (tried: {})", attempted.join(", "))]
    Exhausted {
        attempted: Vec<String>,
        last_error: Option<LlmError>,
    },
}

impl DispatchError {
    pub fn attempted(&self) -> &[String] {
        match self {
            Self::Exhausted { attempted, .. } => attempted,
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    providers: ProviderSet,
    policy: CallPolicy,
}

impl Dispatcher {
    pub fn new(providers: ProviderSet, policy: CallPolicy) -> Self {
        Self { providers, policy }
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    /// Try `candidates` in order and return the first successful completion.
    ///
    /// Candidates whose provider has no transport are skipped without counting
    /// as an attempt.
    pub async fn dispatch(
        &self,
        candidates: &[Model],
        messages: &[ChatMessage],
    ) -> Result<Completion, DispatchError> {
        let mut attempted = Vec::with_capacity(candidates.len());
        let mut last_error = None;

        for candidate in candidates {
            let name = candidate.qualified_name();
            let Some(client) = self.providers.client(candidate.provider) else {
                warn!(model = %name, "Skipping candidate: provider not configured");
                continue;
            };
            attempted.push(name.clone());

            let result = call_with_retry(&self.policy, &name, move || {
                client.chat_completion(&candidate.model_name, messages)
            })
            .await;

            match result {
                Ok(response) => {
                    let content = response.content.unwrap_or_default();
                    let (input_tokens, output_tokens) = match response.usage {
                        Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
                        None => (
                            messages
                                .iter()
                                .map(|m| estimate_tokens_from_text(&m.content))
                                .sum(),
                            estimate_tokens_from_text(&content),
                        ),
                    };
                    if attempted.len() > 1 {
                        info!(
                            model = %name,
                            attempts = attempted.len(),
                            "Served by fallback candidate"
                        );
                    }
                    return Ok(Completion {
                        content,
                        input_tokens,
                        output_tokens,
                        model: candidate.clone(),
                        attempted,
                    });
                }
                Err(e) => {
                    warn!(model = %name, error = %e, "Candidate exhausted, falling back");
                    last_error = Some(e);
                }
            }
        }

        Err(DispatchError::Exhausted {
            attempted,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, Role, TokenUsage};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every model it is asked for and answers from a script.
    struct ScriptedClient {
        provider: Provider,
        calls: Arc<Mutex<Vec<String>>>,
        fail_with: Option<LlmError>,
        usage: Option<TokenUsage>,
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        fn provider(&self) -> Provider {
            self.provider
        }

        async fn chat_completion(
            &self,
            model: &str,
            _messages: &[ChatMessage],
        ) -> Result<ChatResponse, LlmError> {
            self.calls.lock().unwrap().push(format!("{}/{}", self.provider, model));
            match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(ChatResponse {
                    content: Some(format!("answer from {}", model)),
                    usage: self.usage,
                    ..Default::default()
                }),
            }
        }
    }

    fn client(
        provider: Provider,
        calls: &Arc<Mutex<Vec<String>>>,
        fail_with: Option<LlmError>,
    ) -> Arc<dyn LlmClient> {
        Arc::new(ScriptedClient {
            provider,
            calls: Arc::clone(calls),
            fail_with,
            usage: Some(TokenUsage::new(10, 5)),
        })
    }

    fn candidate(provider: Provider, name: &str) -> Model {
        Model {
            provider,
            model_name: name.to_string(),
            ..Model::builtin_default()
        }
    }

    fn policy() -> CallPolicy {
        CallPolicy::immediate(Duration::from_secs(1), 2)
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::new(Role::User, "hello there")]
    }

    #[tokio::test]
    async fn test_primary_success() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let providers =
            ProviderSet::empty().with(Provider::OpenAi, client(Provider::OpenAi, &calls, None));
        let dispatcher = Dispatcher::new(providers, policy());

        let done = dispatcher
            .dispatch(&[candidate(Provider::OpenAi, "gpt-4o-mini")], &messages())
            .await
            .unwrap();
        assert_eq!(done.content, "answer from gpt-4o-mini");
        assert_eq!((done.input_tokens, done.output_tokens), (10, 5));
        assert_eq!(done.attempted, ["openai/gpt-4o-mini"]);
    }

    #[tokio::test]
    async fn test_failed_primary_falls_back_in_ranked_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let providers = ProviderSet::empty()
            .with(
                Provider::Anthropic,
                client(Provider::Anthropic, &calls, Some(LlmError::from_status(401, "no".into()))),
            )
            .with(Provider::Groq, client(Provider::Groq, &calls, None))
            .with(Provider::Google, client(Provider::Google, &calls, None));
        let dispatcher = Dispatcher::new(providers, policy());

        let ranked = vec![
            candidate(Provider::Anthropic, "claude"),
            candidate(Provider::Groq, "llama"),
            candidate(Provider::Google, "gemini"),
        ];
        let done = dispatcher.dispatch(&ranked, &messages()).await.unwrap();

        assert_eq!(done.model.model_name, "llama");
        assert_eq!(*calls.lock().unwrap(), ["anthropic/claude", "groq/llama"]);
        assert_eq!(done.attempted, ["anthropic/claude", "groq/llama"]);
    }

    #[tokio::test]
    async fn test_retryable_failure_uses_budget_before_falling_back() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let providers = ProviderSet::empty()
            .with(
                Provider::OpenAi,
                client(Provider::OpenAi, &calls, Some(LlmError::from_status(503, "busy".into()))),
            )
            .with(Provider::Groq, client(Provider::Groq, &calls, None));
        let dispatcher = Dispatcher::new(providers, policy());

        let ranked = vec![candidate(Provider::OpenAi, "gpt"), candidate(Provider::Groq, "llama")];
        let done = dispatcher.dispatch(&ranked, &messages()).await.unwrap();

        assert_eq!(done.model.model_name, "llama");
        let calls = calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|c| *c == "openai/gpt").count(), 3);
        assert_eq!(calls.last().map(String::as_str), Some("groq/llama"));
    }

    #[tokio::test]
    async fn test_all_candidates_failing_is_exhausted() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let providers = ProviderSet::empty().with(
            Provider::OpenAi,
            client(Provider::OpenAi, &calls, Some(LlmError::from_status(400, "bad".into()))),
        );
        let dispatcher = Dispatcher::new(providers, policy());

        let ranked = vec![candidate(Provider::OpenAi, "a"), candidate(Provider::OpenAi, "b")];
        let err = dispatcher.dispatch(&ranked, &messages()).await.unwrap_err();
        let DispatchError::Exhausted { attempted, last_error } = err;
        assert_eq!(attempted, ["openai/a", "openai/b"]);
        assert_eq!(last_error.unwrap().status, Some(400));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_skipped() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let providers =
            ProviderSet::empty().with(Provider::Groq, client(Provider::Groq, &calls, None));
        let dispatcher = Dispatcher::new(providers, policy());

        let ranked = vec![
            candidate(Provider::Anthropic, "claude"),
            candidate(Provider::Groq, "llama"),
        ];
        let done = dispatcher.dispatch(&ranked, &messages()).await.unwrap();
        assert_eq!(done.attempted, ["groq/llama"]);

        let err = dispatcher
            .dispatch(&[candidate(Provider::Google, "gemini")], &messages())
            .await
            .unwrap_err();
        assert!(err.attempted().is_empty());
    }

    #[tokio::test]
    async fn test_missing_usage_falls_back_to_estimate() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let no_usage: Arc<dyn LlmClient> = Arc::new(ScriptedClient {
            provider: Provider::OpenAi,
            calls: Arc::clone(&calls),
            fail_with: None,
            usage: None,
        });
        let dispatcher =
            Dispatcher::new(ProviderSet::empty().with(Provider::OpenAi, no_usage), policy());

        let done = dispatcher
            .dispatch(&[candidate(Provider::OpenAi, "m")], &messages())
            .await
            .unwrap();
        // "hello there" is 11 chars, "answer from m" is 13.
        assert_eq!(done.input_tokens, 3);
        assert_eq!(done.output_tokens, 4);
    }

    #[test]
    fn test_provider_set_table() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let set = ProviderSet::empty()
            .with(Provider::Google, client(Provider::Google, &calls, None))
            .with(Provider::OpenAi, client(Provider::OpenAi, &calls, None));
        assert_eq!(set.configured(), [Provider::OpenAi, Provider::Google]);
        assert!(set.is_configured(Provider::Google));
        assert!(!set.is_configured(Provider::Anthropic));
        assert_eq!(set.client(Provider::Google).unwrap().provider(), Provider::Google);
    }
}
