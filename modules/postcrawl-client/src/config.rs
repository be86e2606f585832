use std::fmt;
use std::time::Duration;

use reqwest::header::HeaderValue;
use tracing::info;

use crate::error::{ErrorDetail, PostCrawlError, Result};

pub const DEFAULT_BASE_URL: &str = "https://edge.postcrawl.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Every PostCrawl API key starts with this marker.
pub const API_KEY_PREFIX: &str = "sk_";

/// Client configuration, resolved once at construction.
#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Load configuration from `POSTCRAWL_*` environment variables.
    ///
    /// `POSTCRAWL_API_KEY` is required. `POSTCRAWL_API_URL`,
    /// `POSTCRAWL_TIMEOUT_SECS`, `POSTCRAWL_MAX_RETRIES` and
    /// `POSTCRAWL_RETRY_DELAY_SECS` fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("POSTCRAWL_API_KEY").unwrap_or_default();
        let mut config = Self::new(api_key);

        if let Some(url) = lookup("POSTCRAWL_API_URL").filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup("POSTCRAWL_TIMEOUT_SECS") {
            config.timeout = parse_secs("POSTCRAWL_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("POSTCRAWL_MAX_RETRIES") {
            config.max_retries = raw.trim().parse().map_err(|_| {
                env_error("POSTCRAWL_MAX_RETRIES", "must be a non-negative integer")
            })?;
        }
        if let Some(raw) = lookup("POSTCRAWL_RETRY_DELAY_SECS") {
            config.retry_delay = parse_secs("POSTCRAWL_RETRY_DELAY_SECS", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Reject a configuration the client cannot run with. Purely local.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(PostCrawlError::validation(
                "API key is required",
                vec![ErrorDetail::new("api_key", "required", "API key is required")],
            ));
        }
        if !self.api_key.starts_with(API_KEY_PREFIX) {
            let message = format!("API key must start with '{API_KEY_PREFIX}'");
            return Err(PostCrawlError::validation(
                message.clone(),
                vec![ErrorDetail::new("api_key", "invalid_format", message)],
            ));
        }
        if HeaderValue::from_str(&format!("Bearer {}", self.api_key)).is_err() {
            let message = "API key contains characters not allowed in an HTTP header";
            return Err(PostCrawlError::validation(
                message,
                vec![ErrorDetail::new("api_key", "invalid_format", message)],
            ));
        }
        if self.timeout.is_zero() {
            return Err(PostCrawlError::validation(
                "Timeout must be greater than zero",
                vec![ErrorDetail::new("timeout", "out_of_range", "Timeout must be greater than zero")],
            ));
        }
        let url_ok = url::Url::parse(&self.base_url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !url_ok {
            let message = format!("Invalid base URL: {}", self.base_url);
            return Err(PostCrawlError::validation(
                message.clone(),
                vec![ErrorDetail::new("base_url", "invalid_url", message)],
            ));
        }
        Ok(())
    }

    /// Log the configuration with the API key masked.
    pub fn log_redacted(&self) {
        info!(
            api_key = %redact(&self.api_key),
            base_url = %self.base_url,
            timeout_secs = self.timeout.as_secs_f64(),
            max_retries = self.max_retries,
            retry_delay_secs = self.retry_delay.as_secs_f64(),
            "PostCrawl client config"
        );
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

fn redact(key: &str) -> String {
    if key.len() <= API_KEY_PREFIX.len() + 4 {
        return "***".to_string();
    }
    let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("{API_KEY_PREFIX}...{tail}")
}

fn parse_secs(var: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| env_error(var, "must be a non-negative number of seconds"))
}

fn env_error(var: &str, problem: &str) -> PostCrawlError {
    let message = format!("{var} {problem}");
    PostCrawlError::validation(
        message.clone(),
        vec![ErrorDetail::new(var, "invalid_value", message)],
    )
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::new("sk_test_1234567890abcdef");
        assert_eq!(config.base_url, "https://edge.postcrawl.com");
        assert_eq!(config.timeout, Duration::from_secs(90));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_key_rejected() {
        let err = ClientConfig::new("").validate().unwrap_err();
        assert_eq!(err.to_string(), "API key is required");
        assert!(matches!(err, PostCrawlError::Validation { .. }));
    }

    #[test]
    fn key_without_prefix_rejected() {
        let err = ClientConfig::new("invalid_key").validate().unwrap_err();
        assert_eq!(err.to_string(), "API key must start with 'sk_'");
        assert_eq!(err.details()[0].field, "api_key");
    }

    #[test]
    fn key_with_control_characters_rejected() {
        let err = ClientConfig::new("sk_\n").validate().unwrap_err();
        assert!(matches!(err, PostCrawlError::Validation { status: None, .. }));
        assert_eq!(err.details()[0].field, "api_key");
        assert_eq!(err.details()[0].code, "invalid_format");
    }

    #[test]
    fn env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("POSTCRAWL_API_KEY", "sk_test_123"),
            ("POSTCRAWL_API_URL", "http://localhost:8787"),
            ("POSTCRAWL_TIMEOUT_SECS", "30"),
            ("POSTCRAWL_MAX_RETRIES", "5"),
            ("POSTCRAWL_RETRY_DELAY_SECS", "2.5"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "http://localhost:8787");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay, Duration::from_millis(2500));
    }

    #[test]
    fn env_missing_key() {
        let err = ClientConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err.to_string(), "API key is required");
    }

    #[test]
    fn env_bad_number_names_the_variable() {
        let err = ClientConfig::from_lookup(lookup(&[
            ("POSTCRAWL_API_KEY", "sk_test_123"),
            ("POSTCRAWL_MAX_RETRIES", "three"),
        ]))
        .unwrap_err();
        assert_eq!(err.details()[0].field, "POSTCRAWL_MAX_RETRIES");

        let err = ClientConfig::from_lookup(lookup(&[
            ("POSTCRAWL_API_KEY", "sk_test_123"),
            ("POSTCRAWL_RETRY_DELAY_SECS", "-1"),
        ]))
        .unwrap_err();
        assert_eq!(err.details()[0].field, "POSTCRAWL_RETRY_DELAY_SECS");
    }

    #[test]
    fn debug_output_masks_key() {
        let rendered = format!("{:?}", ClientConfig::new("sk_test_1234567890abcdef"));
        assert!(!rendered.contains("1234567890"));
        assert!(rendered.contains("sk_...cdef"));
    }
}
