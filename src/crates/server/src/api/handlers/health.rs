//! Health check handler.

use axum::Json;
use serde_json::{json, Value};

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_payload() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }
}
