//! Model registry: what can be called, at what price, and how fast.
//!
//! The registry itself lives in the `models` table and is written by an
//! external sync job. The gateway only reads it, through [`ModelCache`].

mod cache;

pub use cache::{ModelCache, DEFAULT_CACHE_TTL};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An upstream LLM provider the gateway knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
    Groq,
    OpenRouter,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::OpenAi,
        Provider::Anthropic,
        Provider::Google,
        Provider::Groq,
        Provider::OpenRouter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Groq => "groq",
            Self::OpenRouter => "openrouter",
        }
    }

    /// Environment variable holding this provider's credential.
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Google => "GOOGLE_API_KEY",
            Self::Groq => "GROQ_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "google" | "gemini" => Ok(Self::Google),
            "groq" => Ok(Self::Groq),
            "openrouter" => Ok(Self::OpenRouter),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// A callable (provider, model) pair with its pricing and performance metadata.
///
/// Costs are in currency units per 1,000 tokens and are never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub provider: Provider,
    pub model_name: String,
    pub cost_input: f64,
    pub cost_output: f64,
    /// Historical average latency in milliseconds.
    pub avg_latency: f64,
    /// Task-category tags, e.g. `coding`, `chat`.
    #[serde(default)]
    pub strengths: Vec<String>,
    /// 0-100 scales from external benchmark catalogs.
    #[serde(default)]
    pub quality_rating: Option<f64>,
    #[serde(default)]
    pub speed_index: Option<f64>,
    #[serde(default)]
    pub price_index: Option<f64>,
    #[serde(default)]
    pub deprecated: bool,
}

impl Model {
    /// `provider/model_name`, the form used in logs and debug output.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.provider, self.model_name)
    }

    pub fn has_strength(&self, tag: &str) -> bool {
        self.strengths.iter().any(|s| s == tag)
    }

    /// The model served when the registry has nothing usable for the caller.
    pub fn builtin_default() -> Self {
        Self {
            id: String::new(),
            provider: Provider::OpenAi,
            model_name: "gpt-4o-mini".to_string(),
            cost_input: 0.00015,
            cost_output: 0.0006,
            avg_latency: 400.0,
            strengths: vec!["chat".to_string()],
            quality_rating: None,
            speed_index: None,
            price_index: None,
            deprecated: false,
        }
    }
}
