//! Process-wide configuration
//!
//! Read once at startup from the environment (after `.env` has been loaded)
//! and treated as immutable for the lifetime of the process.

use crate::error::AnalystError;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL_ID: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone)]
pub struct AppConfig {
    pub google_api_key: String,
    /// When set, playground requests must present it as a bearer token.
    pub platform_api_key: Option<String>,
    pub model_id: String,
    pub gemini_base_url: String,
    pub host: String,
    pub chat_port: u16,
    pub playground_port: u16,
    pub submit_timeout: Duration,
    pub max_tool_rounds: usize,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let google_api_key = non_blank("GOOGLE_API_KEY")
            .or_else(|| non_blank("GEMINI_API_KEY"))
            .ok_or_else(|| {
                AnalystError::ConfigurationError(
                    "GOOGLE_API_KEY is not set. Add it to the environment or a .env file"
                        .to_string(),
                )
            })?;

        let chat_port = match non_blank("CHAT_PORT").or_else(|| non_blank("PORT")) {
            Some(raw) => parse_value("CHAT_PORT", &raw)?,
            None => 8501,
        };

        let submit_timeout_secs: u64 =
            parse_or("SUBMIT_TIMEOUT_SECS", non_blank("SUBMIT_TIMEOUT_SECS"), 120)?;
        let max_tool_rounds: usize = parse_or("MAX_TOOL_ROUNDS", non_blank("MAX_TOOL_ROUNDS"), 8)?;

        if submit_timeout_secs == 0 {
            return Err(AnalystError::ConfigurationError(
                "SUBMIT_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        if max_tool_rounds == 0 {
            return Err(AnalystError::ConfigurationError(
                "MAX_TOOL_ROUNDS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            google_api_key,
            platform_api_key: non_blank("PLATFORM_API_KEY"),
            model_id: non_blank("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            gemini_base_url: non_blank("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            host: non_blank("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            chat_port,
            playground_port: parse_or("PLAYGROUND_PORT", non_blank("PLAYGROUND_PORT"), 7777)?,
            submit_timeout: Duration::from_secs(submit_timeout_secs),
            max_tool_rounds,
        })
    }
}

// Keys are secrets; keep them out of debug output.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("google_api_key", &"<redacted>")
            .field("platform_api_key", &self.platform_api_key.as_ref().map(|_| "<redacted>"))
            .field("model_id", &self.model_id)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("host", &self.host)
            .field("chat_port", &self.chat_port)
            .field("playground_port", &self.playground_port)
            .field("submit_timeout", &self.submit_timeout)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .finish()
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>().map_err(|_| {
        AnalystError::ConfigurationError(format!("{} has an invalid value: {}", key, raw))
    })
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_api_key_fails_fast() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("GOOGLE_API_KEY"));

        let blank = AppConfig::from_lookup(lookup_from(&[("GOOGLE_API_KEY", "   ")]));
        assert!(blank.is_err());
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[("GOOGLE_API_KEY", "key")])).unwrap();
        assert_eq!(config.google_api_key, "key");
        assert!(config.platform_api_key.is_none());
        assert_eq!(config.model_id, DEFAULT_MODEL_ID);
        assert_eq!(config.chat_port, 8501);
        assert_eq!(config.playground_port, 7777);
        assert_eq!(config.submit_timeout, Duration::from_secs(120));
        assert_eq!(config.max_tool_rounds, 8);
    }

    #[test]
    fn test_overrides_and_fallbacks() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "legacy"),
            ("PLATFORM_API_KEY", "platform"),
            ("PORT", "9000"),
            ("GEMINI_BASE_URL", "http://localhost:1234/v1beta/"),
            ("MAX_TOOL_ROUNDS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.google_api_key, "legacy");
        assert_eq!(config.platform_api_key.as_deref(), Some("platform"));
        assert_eq!(config.chat_port, 9000);
        assert_eq!(config.gemini_base_url, "http://localhost:1234/v1beta");
        assert_eq!(config.max_tool_rounds, 3);
    }

    #[test]
    fn test_invalid_numbers_are_configuration_errors() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("GOOGLE_API_KEY", "key"),
            ("PLAYGROUND_PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(err.is_configuration());

        let zero_rounds = AppConfig::from_lookup(lookup_from(&[
            ("GOOGLE_API_KEY", "key"),
            ("MAX_TOOL_ROUNDS", "0"),
        ]));
        assert!(zero_rounds.is_err());

        let zero_timeout = AppConfig::from_lookup(lookup_from(&[
            ("GOOGLE_API_KEY", "key"),
            ("SUBMIT_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(zero_timeout.is_configuration());
        assert!(zero_timeout.to_string().contains("SUBMIT_TIMEOUT_SECS"));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("GOOGLE_API_KEY", "super-secret"),
            ("PLATFORM_API_KEY", "also-secret"),
        ]))
        .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("also-secret"));
    }
}
