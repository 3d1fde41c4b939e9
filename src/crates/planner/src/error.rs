//! Error types for planner LLM calls.
//!
//! These errors stay internal to the crate: every public planner entry point
//! resolves a failure to its deterministic fallback instead of surfacing it.

use thiserror::Error;

/// Result type for planner operations.
pub type Result<T> = std::result::Result<T, PlannerError>;

/// Errors that can occur during a planner LLM call.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// API authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// API key not found in environment.
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// Provider-side rate limit exceeded.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// No JSON block found in the model response.
    #[error("No JSON block in response")]
    NoJsonBlock,

    /// Response exceeded the configured size cap.
    #[error("Response too large: {0} bytes")]
    ResponseTooLarge(usize),

    /// JSON did not match the expected schema.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Output failed semantic validation.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Request timed out.
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// General provider error.
    #[error("Provider error: {0}")]
    ProviderError(String),
}

impl From<serde_json::Error> for PlannerError {
    fn from(err: serde_json::Error) -> Self {
        PlannerError::SchemaMismatch(err.to_string())
    }
}
