//! lenslink server binary.
//!
//! Wires the graph store, oracle clients, planner, and run registry into the
//! HTTP surface. Oracle and planner providers are selected from environment
//! credentials; anything unconfigured degrades to an offline stand-in so the
//! server still boots for local development.

use anyhow::Context;
use engine::{EngineConfig, GraphBroadcaster, RunRegistry};
use graphstore::{GraphDatabase, GraphStore};
use oracles::scripted::{ScriptedFaceRecognizer, ScriptedImageSearch, ScriptedVisionFilter};
use oracles::{
    FaceRecognizer, HttpFaceRecognizer, ImageFetcher, ImageSearch, OracleConfig, SerpImageSearch,
    VisionFilter,
};
use planner::{BasicPlanner, LlmPlanner, Planner, PlannerConfig, PlannerVision};
use server::{create_router, AppState, OracleSet, ServerConfig, SlidingWindowLimiter};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let server_config = ServerConfig::from_env();
    let engine_config = EngineConfig::from_env();

    tracing::info!("Connecting to database: {}", server_config.database_url);
    let db = GraphDatabase::new(&server_config.database_url)
        .await
        .context("database connection failed")?;
    db.run_migrations().await.context("migrations failed")?;
    let store = GraphStore::new(db);

    let planner = build_planner();
    let oracles = build_oracles(Arc::clone(&planner))?;

    let registry = Arc::new(RunRegistry::new(engine_config.run_ttl));
    let _sweeper = registry.spawn_sweeper(Duration::from_secs(60));

    let limiter = Arc::new(SlidingWindowLimiter::new(
        server_config.rate_limit_max,
        server_config.rate_limit_window,
        server_config.whitelisted_ips.clone(),
    ));

    let state = AppState {
        store,
        registry,
        broadcaster: GraphBroadcaster::new(),
        planner,
        oracles,
        limiter,
        engine_config,
        stream_timeout: server_config.stream_timeout,
    };

    let router = create_router(state, &server_config.allowed_origins);
    let addr = server_config.bind_addr();
    tracing::info!("lenslink server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, router).await.context("server error")?;

    Ok(())
}

/// Select the planner from environment credentials.
fn build_planner() -> Arc<dyn Planner> {
    let base_url = std::env::var("PLANNER_BASE_URL")
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
    let model = std::env::var("PLANNER_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

    match PlannerConfig::from_env("PLANNER_API_KEY", base_url, model) {
        Ok(mut config) => {
            if let Ok(vision_model) = std::env::var("PLANNER_VISION_MODEL") {
                config = config.with_vision_model(vision_model);
            }
            match LlmPlanner::new(config) {
                Ok(planner) => {
                    tracing::info!("planner: LLM-backed");
                    Arc::new(planner)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "planner client failed, using basic planner");
                    Arc::new(BasicPlanner::new())
                }
            }
        }
        Err(_) => {
            tracing::info!("planner: basic (no PLANNER_API_KEY)");
            Arc::new(BasicPlanner::new())
        }
    }
}

/// Select the oracle clients from environment credentials.
fn build_oracles(planner: Arc<dyn Planner>) -> anyhow::Result<OracleSet> {
    let search: Arc<dyn ImageSearch> = match OracleConfig::from_env(
        "SERP_API_KEY",
        std::env::var("SERP_BASE_URL").unwrap_or_else(|_| "https://serpapi.com".to_string()),
    ) {
        Ok(config) => Arc::new(SerpImageSearch::new(config)?),
        Err(_) => {
            tracing::warn!("SERP_API_KEY unset, image search is offline");
            Arc::new(ScriptedImageSearch::new())
        }
    };

    let recognizer: Arc<dyn FaceRecognizer> = match OracleConfig::from_env(
        "FACE_API_KEY",
        std::env::var("FACE_BASE_URL").unwrap_or_else(|_| "https://faces.lenslink.dev".to_string()),
    ) {
        Ok(config) => Arc::new(HttpFaceRecognizer::new(config)?),
        Err(_) => {
            tracing::warn!("FACE_API_KEY unset, face recognition is offline");
            Arc::new(ScriptedFaceRecognizer::new())
        }
    };

    // The scene filter rides on the planner's vision model when one is
    // configured; without it every image passes as a single scene.
    let vision: Arc<dyn VisionFilter> = if planner.supports_research() {
        Arc::new(PlannerVision(planner))
    } else {
        Arc::new(ScriptedVisionFilter::accepting_all())
    };

    let fetcher = ImageFetcher::new(&OracleConfig::new(String::new(), String::new())).ok();

    Ok(OracleSet {
        search,
        recognizer,
        vision,
        fetcher,
    })
}
