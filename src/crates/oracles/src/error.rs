//! Error types for oracle clients.

use thiserror::Error;

/// Result type for oracle operations.
pub type Result<T> = std::result::Result<T, OracleError>;

/// Errors that can occur when calling an external oracle.
#[derive(Debug, Error)]
pub enum OracleError {
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

    /// Response did not match the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request timed out.
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Fetched body is not a usable image.
    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    /// General provider error.
    #[error("Provider error: {0}")]
    ProviderError(String),
}

impl OracleError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OracleError::HttpError(_)
                | OracleError::Timeout(_)
                | OracleError::RateLimitExceeded(_)
        )
    }
}

impl From<serde_json::Error> for OracleError {
    fn from(err: serde_json::Error) -> Self {
        OracleError::InvalidResponse(err.to_string())
    }
}
