//! CORS layer configuration.

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Build the CORS layer from the allowed-origin list.
///
/// An empty list or a lone `*` allows any origin; otherwise only the listed
/// origins are accepted.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissive_when_unconfigured() {
        let _layer = cors_layer(&[]);
    }

    #[test]
    fn test_restricted_list() {
        let _layer = cors_layer(&["https://app.example.com".to_string()]);
    }
}
