//! API error types and HTTP response conversion.

use axum::{
    http::{header::HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// API result type.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown run or resource.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Investigation quota spent.
    #[error("Rate limit exceeded")]
    RateLimited {
        limit: u32,
        reset_at: DateTime<Utc>,
    },

    /// Downstream oracle or store failure.
    #[error("Integration failure: {0}")]
    Integration(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Integration(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing error category.
    pub fn category(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::Integration(_) => "INTEGRATION_ERROR",
            ApiError::Internal(_) => "UNKNOWN",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitBody {
    error: String,
    remaining: u32,
    reset_at: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::warn!(status = %status, error = %self, "request failed");

        match self {
            ApiError::RateLimited { limit, reset_at } => {
                let body = RateLimitBody {
                    error: "rate limit exceeded".to_string(),
                    remaining: 0,
                    reset_at: reset_at.to_rfc3339(),
                };
                let mut response = (status, Json(body)).into_response();
                let headers = response.headers_mut();
                insert_header(headers, "x-ratelimit-limit", limit.to_string());
                insert_header(headers, "x-ratelimit-remaining", "0".to_string());
                insert_header(headers, "x-ratelimit-reset", reset_at.timestamp().to_string());
                response
            }
            other => {
                let body = ErrorBody {
                    error: other.category().to_string(),
                    message: other.to_string(),
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

fn insert_header(headers: &mut axum::http::HeaderMap, name: &'static str, value: String) {
    if let Ok(value) = value.parse() {
        headers.insert(HeaderName::from_static(name), value);
    }
}

impl From<graphstore::GraphStoreError> for ApiError {
    fn from(err: graphstore::GraphStoreError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(err.to_string())
        } else {
            ApiError::Integration(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::NotFound("run".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Validation("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::RateLimited {
                limit: 50,
                reset_at: Utc::now()
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            ApiError::Validation("bad".to_string()).category(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            ApiError::Integration("oracle".to_string()).category(),
            "INTEGRATION_ERROR"
        );
        assert_eq!(ApiError::Internal("eh".to_string()).category(), "UNKNOWN");
    }

    #[test]
    fn test_rate_limit_response_carries_headers() {
        let err = ApiError::RateLimited {
            limit: 50,
            reset_at: Utc::now(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("x-ratelimit-limit"));
        assert!(response.headers().contains_key("x-ratelimit-remaining"));
        assert!(response.headers().contains_key("x-ratelimit-reset"));
    }
}
