//! Configuration for the LLM-backed planner.

use crate::error::{PlannerError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a chat-completions planner model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the chat-completions API.
    pub base_url: String,

    /// Model identifier for text entry points.
    pub model: String,

    /// Model identifier for vision entry points (scene filter, image
    /// verification). Defaults to `model` when not set.
    pub vision_model: Option<String>,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Maximum accepted response size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl PlannerConfig {
    /// Create a new planner configuration.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            vision_model: None,
            timeout: default_timeout(),
            max_response_bytes: default_max_response_bytes(),
        }
    }

    /// Create configuration reading the API key from an environment variable.
    pub fn from_env(
        env_var: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .map_err(|_| PlannerError::ApiKeyNotFound(format!("Environment variable: {}", env_var)))?;
        Ok(Self::new(api_key, base_url, model))
    }

    /// Set the vision model identifier.
    pub fn with_vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = Some(model.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum accepted response size.
    pub fn with_max_response_bytes(mut self, bytes: usize) -> Self {
        self.max_response_bytes = bytes;
        self
    }

    /// Model used for vision entry points.
    pub fn vision_model(&self) -> &str {
        self.vision_model.as_deref().unwrap_or(&self.model)
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_response_bytes() -> usize {
    64 * 1024
}
