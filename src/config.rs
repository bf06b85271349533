//! Configuration management for the gateway.
//!
//! Configuration is loaded from environment variables:
//! - `HOST` / `PORT` - Bind address (defaults `0.0.0.0:3000`)
//! - `CORS_ORIGIN` - Optional. Single allowed origin; any origin when unset
//! - `SUPABASE_URL` - Required. PostgREST base URL of the registry/audit store
//! - `SUPABASE_SERVICE_KEY` - Required. Service role key for the store
//! - `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `GOOGLE_API_KEY`, `GROQ_API_KEY`,
//!   `OPENROUTER_API_KEY` - Provider credentials, at least one required
//! - `UPSTASH_REDIS_REST_URL` / `UPSTASH_REDIS_REST_TOKEN` - Optional, both or neither
//! - `RATE_LIMIT_MAX` / `RATE_LIMIT_WINDOW_SEC` - Requests per window
//!   (defaults 100 / 60; 0 disables; window at most one year)
//! - `PROVIDER_TIMEOUT_MS`, `PROVIDER_RETRIES`, `PROVIDER_RETRY_MIN_MS`,
//!   `PROVIDER_RETRY_MAX_MS` - Per-call dispatch bounds (defaults 30000 / 2 / 1000 / 3000)
//! - `ADMIN_KEY` - Optional. Enables `POST /v1/admin/models/invalidate`

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::ratelimit::MAX_WINDOW;
use crate::registry::Provider;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("At least one provider API key is required (OPENAI_API_KEY, ANTHROPIC_API_KEY, GOOGLE_API_KEY, GROQ_API_KEY, OPENROUTER_API_KEY)")]
    NoProviders,

    #[error("UPSTASH_REDIS_REST_URL and UPSTASH_REDIS_REST_TOKEN must be set together")]
    PartialUpstash,
}

/// Distributed rate limit counter credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstashConfig {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub cors_origin: Option<String>,

    pub supabase_url: String,
    pub supabase_service_key: String,

    /// Credentials in [`Provider::ALL`] order.
    pub provider_keys: Vec<(Provider, String)>,

    pub upstash: Option<UpstashConfig>,
    pub rate_limit_max: u64,
    pub rate_limit_window_secs: u64,

    pub provider_timeout: Duration,
    pub provider_retries: u32,
    pub provider_retry_min: Duration,
    pub provider_retry_max: Duration,

    pub admin_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require =
            |name: &str| get(name).ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()));

        let supabase_url = require("SUPABASE_URL")?;
        if !(supabase_url.starts_with("http://") || supabase_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                name: "SUPABASE_URL".to_string(),
                reason: "must be an http(s) URL".to_string(),
            });
        }
        let supabase_service_key = require("SUPABASE_SERVICE_KEY")?;

        let provider_keys: Vec<(Provider, String)> = Provider::ALL
            .into_iter()
            .filter_map(|p| get(p.env_var()).map(|key| (p, key)))
            .collect();
        if provider_keys.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        let upstash = match (get("UPSTASH_REDIS_REST_URL"), get("UPSTASH_REDIS_REST_TOKEN")) {
            (Some(url), Some(token)) => Some(UpstashConfig { url, token }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialUpstash),
        };

        let retry_min = parse_or(&get, "PROVIDER_RETRY_MIN_MS", 1000u64)?;
        let retry_max = parse_or(&get, "PROVIDER_RETRY_MAX_MS", 3000u64)?;
        if retry_min > retry_max {
            return Err(ConfigError::InvalidValue {
                name: "PROVIDER_RETRY_MIN_MS".to_string(),
                reason: format!("must not exceed PROVIDER_RETRY_MAX_MS ({})", retry_max),
            });
        }
        let window_secs = parse_or(&get, "RATE_LIMIT_WINDOW_SEC", 60u64)?;
        if window_secs > MAX_WINDOW.as_secs() {
            return Err(ConfigError::InvalidValue {
                name: "RATE_LIMIT_WINDOW_SEC".to_string(),
                reason: format!("must not exceed {} seconds", MAX_WINDOW.as_secs()),
            });
        }
        let timeout_ms = parse_or(&get, "PROVIDER_TIMEOUT_MS", 30_000u64)?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                name: "PROVIDER_TIMEOUT_MS".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "PORT", 3000u16)?,
            cors_origin: get("CORS_ORIGIN"),
            supabase_url,
            supabase_service_key,
            provider_keys,
            upstash,
            rate_limit_max: parse_or(&get, "RATE_LIMIT_MAX", 100u64)?,
            rate_limit_window_secs: window_secs,
            provider_timeout: Duration::from_millis(timeout_ms),
            provider_retries: parse_or(&get, "PROVIDER_RETRIES", 2u32)?,
            provider_retry_min: Duration::from_millis(retry_min),
            provider_retry_max: Duration::from_millis(retry_max),
            admin_key: get("ADMIN_KEY"),
        })
    }

    pub fn provider_key(&self, provider: Provider) -> Option<&str> {
        self.provider_keys
            .iter()
            .find(|(p, _)| *p == provider)
            .map(|(_, key)| key.as_str())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, G>(get: &G, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("{} ({:?})", e, raw),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const BASE: [(&str, &str); 3] = [
        ("SUPABASE_URL", "https://abc.supabase.co"),
        ("SUPABASE_SERVICE_KEY", "service"),
        ("OPENAI_API_KEY", "sk-test"),
    ];

    fn with(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        let mut vars = BASE.to_vec();
        vars.extend_from_slice(extra);
        vars
    }

    fn invalid_name(err: ConfigError) -> String {
        match err {
            ConfigError::InvalidValue { name, .. } => name,
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&BASE)).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.rate_limit_max, 100);
        assert_eq!(config.rate_limit_window_secs, 60);
        assert_eq!(config.provider_timeout, Duration::from_secs(30));
        assert_eq!(config.provider_retries, 2);
        assert_eq!(config.provider_retry_min, Duration::from_millis(1000));
        assert_eq!(config.provider_retry_max, Duration::from_millis(3000));
        assert_eq!(config.provider_keys, [(Provider::OpenAi, "sk-test".to_string())]);
        assert!(config.upstash.is_none());
        assert!(config.admin_key.is_none());
    }

    #[test]
    fn test_missing_store_credentials() {
        let err = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "sk")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingEnvVar("SUPABASE_URL".into()));
    }

    #[test]
    fn test_supabase_url_must_be_http() {
        let vars = [
            ("SUPABASE_URL", "abc.supabase.co"),
            ("SUPABASE_SERVICE_KEY", "k"),
            ("OPENAI_API_KEY", "sk"),
        ];
        assert!(matches!(
            Config::from_lookup(lookup(&vars)),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_requires_a_provider() {
        let vars = [
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_SERVICE_KEY", "k"),
            ("GROQ_API_KEY", "  "),
        ];
        assert_eq!(Config::from_lookup(lookup(&vars)).unwrap_err(), ConfigError::NoProviders);
    }

    #[test]
    fn test_provider_keys_in_fixed_order() {
        let config = Config::from_lookup(lookup(&with(&[
            ("GROQ_API_KEY", "gsk"),
            ("ANTHROPIC_API_KEY", "ak"),
        ])))
        .unwrap();
        let order: Vec<Provider> = config.provider_keys.iter().map(|(p, _)| *p).collect();
        assert_eq!(order, [Provider::OpenAi, Provider::Anthropic, Provider::Groq]);
        assert_eq!(config.provider_key(Provider::Groq), Some("gsk"));
        assert_eq!(config.provider_key(Provider::Google), None);
    }

    #[test]
    fn test_upstash_both_or_neither() {
        let url_only = with(&[("UPSTASH_REDIS_REST_URL", "https://u.io")]);
        let err = Config::from_lookup(lookup(&url_only)).unwrap_err();
        assert_eq!(err, ConfigError::PartialUpstash);

        let empty_token = with(&[
            ("UPSTASH_REDIS_REST_URL", "https://u.io"),
            ("UPSTASH_REDIS_REST_TOKEN", ""),
        ]);
        assert_eq!(
            Config::from_lookup(lookup(&empty_token)).unwrap_err(),
            ConfigError::PartialUpstash
        );

        let both = with(&[
            ("UPSTASH_REDIS_REST_URL", "https://u.io"),
            ("UPSTASH_REDIS_REST_TOKEN", "tok"),
        ]);
        let config = Config::from_lookup(lookup(&both)).unwrap();
        assert_eq!(config.upstash.unwrap().token, "tok");
    }

    #[test]
    fn test_invalid_numbers() {
        let err = Config::from_lookup(lookup(&with(&[("RATE_LIMIT_MAX", "lots")]))).unwrap_err();
        assert_eq!(invalid_name(err), "RATE_LIMIT_MAX");

        let err = Config::from_lookup(lookup(&with(&[
            ("PROVIDER_RETRY_MIN_MS", "5000"),
            ("PROVIDER_RETRY_MAX_MS", "100"),
        ])))
        .unwrap_err();
        assert_eq!(invalid_name(err), "PROVIDER_RETRY_MIN_MS");
    }

    #[test]
    fn test_rate_limit_window_is_bounded() {
        let err = Config::from_lookup(lookup(&with(&[(
            "RATE_LIMIT_WINDOW_SEC",
            "18446744073709551615",
        )])))
        .unwrap_err();
        assert_eq!(invalid_name(err), "RATE_LIMIT_WINDOW_SEC");

        let config =
            Config::from_lookup(lookup(&with(&[("RATE_LIMIT_WINDOW_SEC", "31536000")]))).unwrap();
        assert_eq!(config.rate_limit_window_secs, MAX_WINDOW.as_secs());
    }

    #[test]
    fn test_rate_limit_can_be_disabled() {
        let config = Config::from_lookup(lookup(&with(&[("RATE_LIMIT_MAX", "0")]))).unwrap();
        assert_eq!(config.rate_limit_max, 0);
    }
}
