//! Common configuration for oracle clients.

use crate::error::{OracleError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Browser-like user agent sent when fetching image bytes. Many CDNs refuse
/// requests that do not look like a browser.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Configuration shared by hosted oracle clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API.
    pub base_url: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// User agent sent with requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl OracleConfig {
    /// Create a new oracle configuration.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }

    /// Create configuration reading the API key from an environment variable.
    pub fn from_env(env_var: &str, base_url: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .map_err(|_| OracleError::ApiKeyNotFound(format!("Environment variable: {}", env_var)))?;
        Ok(Self::new(api_key, base_url))
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_user_agent() -> String {
    BROWSER_USER_AGENT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = OracleConfig::new("key", "https://api.example.com")
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("test-agent");

        assert_eq!(config.api_key, "key");
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "test-agent");
    }

    #[test]
    fn test_from_env_missing_key() {
        let err = OracleConfig::from_env("LENSLINK_TEST_NO_SUCH_KEY", "https://x").unwrap_err();
        assert!(matches!(err, OracleError::ApiKeyNotFound(_)));
    }
}
