//! Run admission.
//!
//! A new investigation first tries the graph cache: when a path between the
//! pair already exists, the response is a synthesised completed run whose
//! log holds a single `final` event built from the cached steps. Only on a
//! cache miss is a live run allocated and spawned.

use crate::api::routes::AppState;
use domain::confidence::cumulative;
use engine::{
    Budgets, EdgeSummary, EventData, EventType, FinalOutcome, Orchestrator, RunHandle, RunStatus,
    VerificationPipeline, DISCLAIMER,
};
use graphstore::PathResult;
use std::sync::Arc;

/// Build a completed run from a cached path lookup.
pub fn synthesise_cached_run(
    person_a: &str,
    person_b: &str,
    cached: &PathResult,
) -> Arc<RunHandle> {
    let run = Arc::new(RunHandle::new(person_a, person_b));

    let steps: Vec<EdgeSummary> = cached
        .steps
        .iter()
        .map(|s| EdgeSummary {
            from: s.from.clone(),
            to: s.to.clone(),
            confidence: s.confidence.clamp(0, 100) as u8,
            evidence_url: None,
            thumbnail_url: s.thumbnail_url.clone(),
            context_url: s.context_url.clone(),
        })
        .collect();
    let confidences: Vec<u8> = steps.iter().map(|s| s.confidence).collect();

    let outcome = FinalOutcome {
        path: cached.path.clone(),
        steps,
        min_confidence: cached.min_confidence.clamp(0, 100) as u8,
        cumulative_confidence: cumulative(&confidences),
        disclaimer: DISCLAIMER.to_string(),
    };

    let mut data = EventData::new().with_path(cached.path.clone());
    data.hop_depth = Some(cached.hops as u32);
    data.result = Some(outcome);
    run.log.append(
        EventType::Final,
        format!(
            "Known path between {} and {} ({} hops)",
            person_a, person_b, cached.hops
        ),
        data,
    );
    run.finish(RunStatus::Success);
    run
}

/// Allocate a live run and drive it on a background task.
pub fn spawn_run(state: &AppState, person_a: &str, person_b: &str) -> Arc<RunHandle> {
    let run = Arc::new(RunHandle::new(person_a, person_b));
    state.registry.insert(Arc::clone(&run));

    let config = state.engine_config.clone();
    let budgets = Arc::new(Budgets::new(
        config.search_budget,
        config.recognition_budget,
        config.llm_budget,
    ));
    let mut pipeline = VerificationPipeline::new(
        Arc::clone(&state.oracles.search),
        Arc::clone(&state.oracles.recognizer),
        Arc::clone(&state.oracles.vision),
        Arc::clone(&state.planner),
        budgets,
        config.clone(),
    );
    if let Some(fetcher) = state.oracles.fetcher.clone() {
        pipeline = pipeline.with_fetcher(fetcher);
    }
    let orchestrator = Orchestrator::new(
        pipeline,
        Arc::clone(&state.planner),
        state.store.clone(),
        state.broadcaster.clone(),
        config,
    );

    let task_run = Arc::clone(&run);
    tokio::spawn(async move {
        let outcome = orchestrator.investigate(&task_run).await;
        tracing::info!(
            run_id = %task_run.run_id,
            status = ?outcome.status,
            hops = outcome.edges.len(),
            "investigation finished"
        );
    });

    run
}
