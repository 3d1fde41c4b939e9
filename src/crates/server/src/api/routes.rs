//! API route definitions and shared application state.

use crate::api::cors::cors_layer;
use crate::api::handlers;
use crate::ratelimit::SlidingWindowLimiter;
use axum::{
    routing::{get, post},
    Router,
};
use engine::{EngineConfig, GraphBroadcaster, RunRegistry};
use graphstore::GraphStore;
use oracles::{FaceRecognizer, ImageFetcher, ImageSearch, VisionFilter};
use planner::Planner;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// The oracle handles shared by every run.
#[derive(Clone)]
pub struct OracleSet {
    pub search: Arc<dyn ImageSearch>,
    pub recognizer: Arc<dyn FaceRecognizer>,
    pub vision: Arc<dyn VisionFilter>,
    /// When set, image bytes are fetched and sniffed before analysis.
    pub fetcher: Option<ImageFetcher>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: GraphStore,
    pub registry: Arc<RunRegistry>,
    pub broadcaster: GraphBroadcaster,
    pub planner: Arc<dyn Planner>,
    pub oracles: OracleSet,
    pub limiter: Arc<SlidingWindowLimiter>,
    pub engine_config: EngineConfig,
    /// Hard cap on any single stream connection.
    pub stream_timeout: Duration,
}

/// Build the complete API router.
pub fn create_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Investigation endpoints
        .route("/chat/parse", post(handlers::parse_query))
        .route("/chat/query", post(handlers::start_run))
        .route("/chat/events/:run_id", get(handlers::run_events))
        .route("/chat/stream/:run_id", get(handlers::run_sse))
        .route("/chat/ws/:run_id", get(handlers::run_ws))
        .route("/chat/status/:run_id", get(handlers::run_status))
        // Graph endpoints
        .route("/graph", get(handlers::graph_snapshot))
        .route("/graph/stats", get(handlers::graph_stats))
        .route("/graph/path", get(handlers::graph_path))
        .route("/graph/ws", get(handlers::graph_ws))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
