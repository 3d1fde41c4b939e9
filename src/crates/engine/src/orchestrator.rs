//! Investigation orchestrator.
//!
//! Drives one run through its states: direct attempt, optional research,
//! discovery, planner-guided selection, verify-and-bridge, bounded by the
//! hop limit and the oracle budgets. Every observable transition lands on
//! the run's event log; every verified edge is persisted and broadcast.

use crate::budget::BudgetTier;
use crate::bus::{EdgeUpdate, GraphBroadcaster, RunHandle, RunStatus};
use crate::candidates::{aggregate_candidates, enough_candidates, CandidateRecord};
use crate::config::EngineConfig;
use crate::events::{
    EdgeSummary, ErrorCategory, EventData, EventType, FinalOutcome, StepId, StepStatus, DISCLAIMER,
};
use crate::verify::{VerificationPipeline, VerifiedEdge};
use domain::confidence::{bottleneck, cumulative};
use domain::names_match;
use graphstore::{EdgeEvidence, GraphStore};
use planner::{fallback, BridgeSuggestion, CandidateBrief, ExpansionInput, Planner, Research};
use std::sync::Arc;

/// Terminal result of one investigation.
#[derive(Debug, Clone)]
pub struct InvestigationOutcome {
    pub status: RunStatus,
    /// Display names, endpoints included, when a path was found
    pub path: Vec<String>,
    pub edges: Vec<VerifiedEdge>,
    pub min_confidence: u8,
    pub cumulative_confidence: f64,
    pub reason: Option<String>,
}

/// Per-run investigation driver.
pub struct Orchestrator {
    pipeline: VerificationPipeline,
    planner: Arc<dyn Planner>,
    store: GraphStore,
    broadcaster: GraphBroadcaster,
    config: EngineConfig,
}

impl Orchestrator {
    /// Create an orchestrator over the pipeline, planner, and shared state.
    pub fn new(
        pipeline: VerificationPipeline,
        planner: Arc<dyn Planner>,
        store: GraphStore,
        broadcaster: GraphBroadcaster,
        config: EngineConfig,
    ) -> Self {
        Self {
            pipeline,
            planner,
            store,
            broadcaster,
            config,
        }
    }

    /// Reserve an LLM call for a planner entry point.
    ///
    /// Fallback-only planners never touch the model, so their calls are
    /// free; for an LLM-backed planner each entry point costs one call of
    /// the llm tier.
    fn consume_llm(&self) -> bool {
        if !self.planner.supports_research() {
            return true;
        }
        self.pipeline.budgets().try_consume(BudgetTier::Llm)
    }

    /// Run the investigation to a terminal event.
    pub async fn investigate(&self, run: &RunHandle) -> InvestigationOutcome {
        let log = &run.log;
        let person_a = run.person_a.clone();
        let person_b = run.person_b.clone();

        log.append(
            EventType::Status,
            format!("Investigating {} and {}", person_a, person_b),
            EventData::new()
                .with_pair(&person_a, &person_b)
                .with_budget(self.pipeline.budgets().snapshot()),
        );

        // Direct attempt first: a single photo of both endpoints ends the
        // run in one hop.
        log.append(
            EventType::StepStart,
            format!("Looking for a direct photo of {} and {}", person_a, person_b),
            EventData::new()
                .with_step(StepId::DirectCheck, StepStatus::Running)
                .with_pair(&person_a, &person_b),
        );
        if let Some(edge) = self.pipeline.verify_edge(log, &person_a, &person_b).await {
            self.persist(run, &edge).await;
            log.append(
                EventType::StepComplete,
                "Direct connection verified",
                EventData::new().with_step(StepId::DirectCheck, StepStatus::Done),
            );
            return self.success(run, vec![person_a, person_b], vec![edge]);
        }
        log.append(
            EventType::StepComplete,
            "No direct photo found",
            EventData::new().with_step(StepId::DirectCheck, StepStatus::Failed),
        );

        if run.is_cancelled() {
            return self.cancelled(run);
        }

        // Optional research pass for planners that support it.
        let mut research: Option<Research> = None;
        let mut suggestions: Vec<BridgeSuggestion> = Vec::new();
        if self.planner.supports_research() {
            if self.consume_llm() {
                let r = self.planner.research_connection(&person_a, &person_b).await;
                let mut data = EventData::new();
                data.reasoning = Some(r.reasoning.clone());
                log.append(EventType::Research, r.summary.clone(), data);
                research = Some(r);
            }
            if self.consume_llm() {
                suggestions = self
                    .planner
                    .suggest_bridge_candidates(
                        &person_a,
                        &person_b,
                        &[person_a.clone(), person_b.clone()],
                    )
                    .await;
                if !suggestions.is_empty() {
                    log.append(
                        EventType::Thinking,
                        format!("Considering {} possible bridges", suggestions.len()),
                        EventData::new().with_reason(
                            suggestions
                                .iter()
                                .map(|s| s.name.clone())
                                .collect::<Vec<_>>()
                                .join(", "),
                        ),
                    );
                }
            }
        }

        let mut frontier = person_a.clone();
        let mut path = vec![person_a.clone()];
        let mut edges: Vec<VerifiedEdge> = Vec::new();
        let mut failed: Vec<String> = Vec::new();
        let mut hop_depth: u32 = 0;

        'expand: while hop_depth < self.config.hop_limit {
            if run.is_cancelled() {
                return self.cancelled(run);
            }
            if self.pipeline.budgets().terminally_exhausted() {
                break;
            }

            // Discovery at the current frontier.
            let mut data = EventData::new()
                .with_step(StepId::FindBridges, StepStatus::Running)
                .with_frontier(&frontier)
                .with_budget(self.pipeline.budgets().snapshot());
            data.hop_depth = Some(hop_depth);
            log.append(
                EventType::StepStart,
                format!("Searching for people photographed with {}", frontier),
                data,
            );

            let records = self
                .discover(run, &frontier, &person_b, &suggestions, &path, &failed, research.as_ref())
                .await;

            if records.is_empty() {
                log.append(
                    EventType::StepComplete,
                    format!("Nobody co-recognised with {}", frontier),
                    EventData::new().with_step(StepId::FindBridges, StepStatus::Failed),
                );
                break 'expand;
            }

            let briefs: Vec<CandidateBrief> = records.iter().map(|r| r.brief()).collect();
            let mut data = EventData::new().with_frontier(&frontier);
            data.candidates = Some(briefs.clone());
            log.append(
                EventType::CandidateDiscovery,
                format!("{} candidates discovered around {}", briefs.len(), frontier),
                data,
            );
            log.append(
                EventType::StepComplete,
                "Bridge discovery complete",
                EventData::new().with_step(StepId::FindBridges, StepStatus::Done),
            );

            if research.is_some() && self.consume_llm() {
                let ranking = self
                    .planner
                    .rank_candidates_strategically(&frontier, &person_b, &briefs, research.as_ref())
                    .await;
                let mut data = EventData::new();
                data.reasoning = Some(ranking.hypothesis.clone());
                log.append(EventType::Strategy, ranking.strategy.clone(), data);
            }

            // Selection and verification until the frontier advances or the
            // candidate pool dries up.
            let mut advanced = false;
            'select: loop {
                if run.is_cancelled() {
                    return self.cancelled(run);
                }
                if self.pipeline.budgets().terminally_exhausted() {
                    break 'expand;
                }

                let viable: Vec<CandidateBrief> = briefs
                    .iter()
                    .filter(|c| !failed.iter().any(|f| names_match(f, &c.name).is_some()))
                    .cloned()
                    .collect();
                if viable.is_empty() {
                    break 'select;
                }

                let input = ExpansionInput {
                    frontier: frontier.clone(),
                    target: person_b.clone(),
                    candidates: briefs.clone(),
                    failed_candidates: failed.clone(),
                    search_remaining: self.pipeline.budgets().remaining(BudgetTier::Search),
                    recognition_remaining: self
                        .pipeline
                        .budgets()
                        .remaining(BudgetTier::Recognition),
                    llm_remaining: self.pipeline.budgets().remaining(BudgetTier::Llm),
                    hop_depth,
                };
                let choice = if self.consume_llm() {
                    self.planner.select_next_expansion(&input).await
                } else {
                    fallback::select_next_expansion(&input)
                };

                let mut data = EventData::new().with_frontier(&frontier);
                data.reasoning = Some(choice.reason.clone());
                log.append(
                    EventType::LlmSelection,
                    if choice.narration.is_empty() {
                        "Next candidates selected".to_string()
                    } else {
                        choice.narration.clone()
                    },
                    data,
                );

                if choice.stop || choice.next_candidates.is_empty() {
                    break 'select;
                }

                let chosen: Vec<String> = choice
                    .next_candidates
                    .iter()
                    .filter(|c| !failed.iter().any(|f| names_match(f, c).is_some()))
                    .cloned()
                    .collect();
                if chosen.is_empty() {
                    // Selection ignored the failure list; count the round as
                    // spent so the loop converges.
                    failed.extend(choice.next_candidates.clone());
                    continue 'select;
                }

                for candidate in &chosen {
                    if run.is_cancelled() {
                        return self.cancelled(run);
                    }
                    log.append(
                        EventType::StepStart,
                        format!("Verifying {} together with {}", frontier, candidate),
                        EventData::new()
                            .with_step(StepId::VerifyBridge, StepStatus::Running)
                            .with_pair(&frontier, candidate),
                    );
                    let Some(edge) = self.pipeline.verify_edge(log, &frontier, candidate).await
                    else {
                        failed.push(candidate.clone());
                        log.append(
                            EventType::StepComplete,
                            format!("Could not verify {} with {}", frontier, candidate),
                            EventData::new()
                                .with_step(StepId::VerifyBridge, StepStatus::Failed)
                                .with_pair(&frontier, candidate),
                        );
                        continue;
                    };

                    self.persist(run, &edge).await;
                    path.push(candidate.clone());
                    hop_depth += 1;
                    edges.push(edge);
                    let mut data = EventData::new()
                        .with_step(StepId::VerifyBridge, StepStatus::Done)
                        .with_path(path.clone());
                    data.hop_depth = Some(hop_depth);
                    log.append(
                        EventType::StepComplete,
                        format!("{} verified as a bridge", candidate),
                        data,
                    );
                    log.append(
                        EventType::PathUpdate,
                        format!("Path now runs through {}", candidate),
                        EventData::new().with_path(path.clone()),
                    );

                    // Bridge verified; try to close the gap to the target.
                    log.append(
                        EventType::StepStart,
                        format!("Trying to connect {} to {}", candidate, person_b),
                        EventData::new()
                            .with_step(StepId::ConnectTarget, StepStatus::Running)
                            .with_pair(candidate, &person_b),
                    );
                    if let Some(final_edge) =
                        self.pipeline.verify_edge(log, candidate, &person_b).await
                    {
                        self.persist(run, &final_edge).await;
                        path.push(person_b.clone());
                        edges.push(final_edge);
                        log.append(
                            EventType::StepComplete,
                            format!("{} reached", person_b),
                            EventData::new().with_step(StepId::ConnectTarget, StepStatus::Done),
                        );
                        return self.success(run, path, edges);
                    }
                    log.append(
                        EventType::StepComplete,
                        format!("{} not yet reachable from {}", person_b, candidate),
                        EventData::new().with_step(StepId::ConnectTarget, StepStatus::Failed),
                    );

                    frontier = candidate.clone();
                    failed.clear();
                    advanced = true;
                    break 'select;
                }
            }

            if !advanced {
                break 'expand;
            }
        }

        let reason = if self.pipeline.budgets().terminally_exhausted() {
            format!(
                "search and recognition budgets were exhausted after {} verified hops",
                hop_depth
            )
        } else if hop_depth >= self.config.hop_limit {
            format!("hop limit of {} reached without meeting the target", self.config.hop_limit)
        } else {
            format!("no viable bridge candidates remained after {} verified hops", hop_depth)
        };
        self.no_path(run, hop_depth, reason)
    }

    /// Discovery round: build the query plan and aggregate candidates until
    /// enough strong ones exist or the search budget dries up.
    async fn discover(
        &self,
        run: &RunHandle,
        frontier: &str,
        target: &str,
        suggestions: &[BridgeSuggestion],
        path: &[String],
        failed: &[String],
        research: Option<&Research>,
    ) -> Vec<CandidateRecord> {
        let queries = self
            .build_queries(frontier, target, suggestions, path, failed, research)
            .await;

        let mut analyses = Vec::new();
        let mut records = Vec::new();
        for query in queries {
            if run.is_cancelled() {
                break;
            }
            let Some(batch) = self.pipeline.discover_query(&run.log, &query).await else {
                break;
            };
            analyses.extend(batch);
            records = aggregate_candidates(frontier, &analyses, path, self.config.confidence_threshold);
            if enough_candidates(
                &records,
                self.config.early_stop_candidates,
                self.config.early_stop_confidence,
            ) {
                break;
            }
        }
        records
    }

    /// Assemble the discovery query plan: suggestion pair queries first,
    /// then planner queries, then the fixed fallbacks.
    async fn build_queries(
        &self,
        frontier: &str,
        target: &str,
        suggestions: &[BridgeSuggestion],
        path: &[String],
        failed: &[String],
        research: Option<&Research>,
    ) -> Vec<String> {
        let mut queries: Vec<String> = Vec::new();
        let mut push = |q: String, queries: &mut Vec<String>| {
            if !q.trim().is_empty() && !queries.contains(&q) {
                queries.push(q);
            }
        };

        for suggestion in suggestions {
            let spent = path
                .iter()
                .chain(failed.iter())
                .any(|p| names_match(p, &suggestion.name).is_some());
            if !spent {
                push(format!("{} {}", frontier, suggestion.name), &mut queries);
            }
        }

        let planned = if research.is_some() {
            if self.consume_llm() {
                self.planner
                    .generate_smart_queries(frontier, target, research)
                    .await
            } else {
                fallback::smart_queries(frontier, target)
            }
        } else {
            self.planner.generate_frontier_queries(frontier).await
        };
        for q in planned {
            push(q, &mut queries);
        }

        for q in fallback::frontier_queries(frontier) {
            push(q, &mut queries);
        }

        queries.truncate(self.config.max_queries_per_hop);
        queries
    }

    /// Persist a verified edge and broadcast the delta. A storage failure is
    /// reported but does not end the run; the in-memory path still stands.
    async fn persist(&self, run: &RunHandle, edge: &VerifiedEdge) {
        let evidence = EdgeEvidence {
            best_evidence_url: Some(edge.best.image_url.clone()),
            best_thumbnail_url: Some(edge.best.thumbnail_url.clone()),
            context_url: Some(edge.best.context_url.clone()),
        };
        match self
            .store
            .upsert_edge(&edge.a, &edge.b, edge.confidence, evidence)
            .await
        {
            Ok(stored) => {
                self.broadcaster.publish(EdgeUpdate {
                    source: edge.a.clone(),
                    target: edge.b.clone(),
                    confidence: edge.confidence,
                    thumbnail_url: stored.best_thumbnail_url.clone(),
                    context_url: stored.context_url.clone(),
                });
                let mut data = EventData::new();
                data.edge = Some(EdgeSummary {
                    from: edge.a.clone(),
                    to: edge.b.clone(),
                    confidence: edge.confidence,
                    evidence_url: Some(edge.best.image_url.clone()),
                    thumbnail_url: Some(edge.best.thumbnail_url.clone()),
                    context_url: Some(edge.best.context_url.clone()),
                });
                run.log.append(
                    EventType::Evidence,
                    format!(
                        "Verified {} and {} at confidence {}",
                        edge.a, edge.b, edge.confidence
                    ),
                    data,
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to persist verified edge");
                run.log.append(
                    EventType::Status,
                    format!("Could not persist edge {} -- {}: {}", edge.a, edge.b, e),
                    EventData::new().with_reason(e.to_string()),
                );
            }
        }
    }

    fn success(
        &self,
        run: &RunHandle,
        path: Vec<String>,
        edges: Vec<VerifiedEdge>,
    ) -> InvestigationOutcome {
        let confidences: Vec<u8> = edges.iter().map(|e| e.confidence).collect();
        let min_confidence = bottleneck(&confidences);
        let cumulative_confidence = cumulative(&confidences);
        let steps: Vec<EdgeSummary> = edges
            .iter()
            .map(|e| EdgeSummary {
                from: e.a.clone(),
                to: e.b.clone(),
                confidence: e.confidence,
                evidence_url: Some(e.best.image_url.clone()),
                thumbnail_url: Some(e.best.thumbnail_url.clone()),
                context_url: Some(e.best.context_url.clone()),
            })
            .collect();

        let outcome = FinalOutcome {
            path: path.clone(),
            steps,
            min_confidence,
            cumulative_confidence,
            disclaimer: DISCLAIMER.to_string(),
        };
        let mut data = EventData::new().with_path(path.clone());
        data.result = Some(outcome);
        data.hop_depth = Some(edges.len() as u32);
        run.log.append(
            EventType::Final,
            format!("Connected {} in {} hops", path.join(" -> "), edges.len()),
            data,
        );
        run.finish(RunStatus::Success);

        InvestigationOutcome {
            status: RunStatus::Success,
            path,
            edges,
            min_confidence,
            cumulative_confidence,
            reason: None,
        }
    }

    fn no_path(&self, run: &RunHandle, hop_depth: u32, reason: String) -> InvestigationOutcome {
        let mut data = EventData::new()
            .with_reason(reason.clone())
            .with_budget(self.pipeline.budgets().snapshot());
        data.hop_depth = Some(hop_depth);
        run.log.append(
            EventType::NoPath,
            format!(
                "No verified path between {} and {}: {}",
                run.person_a, run.person_b, reason
            ),
            data,
        );
        run.finish(RunStatus::Failed);

        InvestigationOutcome {
            status: RunStatus::Failed,
            path: Vec::new(),
            edges: Vec::new(),
            min_confidence: 0,
            cumulative_confidence: 0.0,
            reason: Some(reason),
        }
    }

    fn cancelled(&self, run: &RunHandle) -> InvestigationOutcome {
        let mut data = EventData::new();
        data.category = Some(ErrorCategory::Cancelled);
        run.log
            .append(EventType::Error, "Investigation cancelled", data);
        run.finish(RunStatus::Failed);

        InvestigationOutcome {
            status: RunStatus::Failed,
            path: Vec::new(),
            edges: Vec::new(),
            min_confidence: 0,
            cumulative_confidence: 0.0,
            reason: Some("cancelled".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::Budgets;
    use crate::bus::RunLog;
    use oracles::scripted::{face, hit, ScriptedFaceRecognizer, ScriptedImageSearch, ScriptedVisionFilter};
    use planner::ScriptedPlanner;

    fn orchestrator_with(
        search: ScriptedImageSearch,
        recognizer: ScriptedFaceRecognizer,
        vision: ScriptedVisionFilter,
        planner: ScriptedPlanner,
        store: GraphStore,
        config: EngineConfig,
    ) -> Orchestrator {
        let budgets = Arc::new(Budgets::new(
            config.search_budget,
            config.recognition_budget,
            config.llm_budget,
        ));
        let planner: Arc<dyn Planner> = Arc::new(planner);
        let pipeline = VerificationPipeline::new(
            Arc::new(search),
            Arc::new(recognizer),
            Arc::new(vision),
            Arc::clone(&planner),
            budgets,
            config.clone(),
        );
        Orchestrator::new(pipeline, planner, store, GraphBroadcaster::new(), config)
    }

    async fn in_memory_store() -> GraphStore {
        GraphStore::new(graphstore::GraphDatabase::in_memory().await.unwrap())
    }

    fn events_of_type(log: &RunLog, event_type: EventType) -> usize {
        log.events_from(0)
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    #[tokio::test]
    async fn test_direct_hit_finishes_in_one_hop() {
        let search = ScriptedImageSearch::new().on(
            "Donald Trump Kanye West",
            vec![hit("https://img/tk.jpg", "https://page/tk")],
        );
        let recognizer = ScriptedFaceRecognizer::new().on(
            "tk.jpg",
            vec![face("Donald Trump", 96.0), face("Kanye West", 88.0)],
        );
        let store = in_memory_store().await;
        let orchestrator = orchestrator_with(
            search,
            recognizer,
            ScriptedVisionFilter::accepting_all(),
            ScriptedPlanner::new(),
            store.clone(),
            EngineConfig::default(),
        );

        let run = RunHandle::new("Donald Trump", "Kanye West");
        let outcome = orchestrator.investigate(&run).await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(
            outcome.path,
            vec!["Donald Trump".to_string(), "Kanye West".to_string()]
        );
        assert_eq!(outcome.min_confidence, 88);
        assert!(run.log.is_complete());
        assert_eq!(events_of_type(&run.log, EventType::Final), 1);

        let persisted = store.find_path("Donald Trump", "Kanye West").await.unwrap();
        assert!(persisted.found);
        assert_eq!(persisted.hops, 1);
    }

    #[tokio::test]
    async fn test_two_hop_bridge() {
        // No direct A-B photos; "A X" discovery surfaces bridge M at 95;
        // "M B" verification recognises both at 88+.
        let search = ScriptedImageSearch::new()
            .on("Alpha One photo", vec![hit("https://img/am.jpg", "https://page/am")])
            .on("Mike Bridge Beta Two", vec![hit("https://img/mb.jpg", "https://page/mb")])
            .on("Alpha One Mike Bridge", vec![hit("https://img/am2.jpg", "https://page/am2")]);
        let recognizer = ScriptedFaceRecognizer::new()
            .on("am.jpg", vec![face("Alpha One", 97.0), face("Mike Bridge", 95.0)])
            .on("am2.jpg", vec![face("Alpha One", 96.0), face("Mike Bridge", 95.0)])
            .on("mb.jpg", vec![face("Mike Bridge", 90.0), face("Beta Two", 88.0)]);
        let store = in_memory_store().await;
        let orchestrator = orchestrator_with(
            search,
            recognizer,
            ScriptedVisionFilter::accepting_all(),
            ScriptedPlanner::new(),
            store.clone(),
            EngineConfig::default(),
        );

        let run = RunHandle::new("Alpha One", "Beta Two");
        let outcome = orchestrator.investigate(&run).await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(
            outcome.path,
            vec![
                "Alpha One".to_string(),
                "Mike Bridge".to_string(),
                "Beta Two".to_string()
            ]
        );
        assert_eq!(outcome.min_confidence, 88);
        assert_eq!(outcome.edges.len(), 2);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.edge_count, 2);
    }

    #[tokio::test]
    async fn test_search_budget_exhaustion_reports_budgets() {
        let search = ScriptedImageSearch::new();
        let store = in_memory_store().await;
        let config = EngineConfig::default().with_budgets(2, 100, 15);
        let orchestrator = orchestrator_with(
            search,
            ScriptedFaceRecognizer::new(),
            ScriptedVisionFilter::accepting_all(),
            ScriptedPlanner::new(),
            store,
            config,
        );

        let run = RunHandle::new("Alpha One", "Beta Two");
        let outcome = orchestrator.investigate(&run).await;

        assert_eq!(outcome.status, RunStatus::Failed);
        let reason = outcome.reason.unwrap();
        assert!(reason.contains("budget"), "reason should mention budgets: {}", reason);
        assert_eq!(events_of_type(&run.log, EventType::NoPath), 1);
    }

    #[tokio::test]
    async fn test_collage_rejection_leaves_no_evidence() {
        let search = ScriptedImageSearch::new()
            .on("Alpha One", vec![hit("https://img/any.jpg", "https://page/any")]);
        let recognizer = ScriptedFaceRecognizer::new().on(
            "any.jpg",
            vec![face("Alpha One", 95.0), face("Beta Two", 95.0)],
        );
        let store = in_memory_store().await;
        let orchestrator = orchestrator_with(
            search,
            recognizer,
            ScriptedVisionFilter::rejecting_all(),
            ScriptedPlanner::new(),
            store.clone(),
            EngineConfig::default(),
        );

        let run = RunHandle::new("Alpha One", "Beta Two");
        let outcome = orchestrator.investigate(&run).await;

        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(events_of_type(&run.log, EventType::Evidence), 0);
        assert_eq!(events_of_type(&run.log, EventType::NoPath), 1);
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.edge_count, 0);
    }

    #[tokio::test]
    async fn test_cancellation_yields_terminal_error() {
        let search = ScriptedImageSearch::new();
        let store = in_memory_store().await;
        let orchestrator = orchestrator_with(
            search,
            ScriptedFaceRecognizer::new(),
            ScriptedVisionFilter::accepting_all(),
            ScriptedPlanner::new(),
            store,
            EngineConfig::default(),
        );

        let run = RunHandle::new("Alpha One", "Beta Two");
        run.cancel();
        let outcome = orchestrator.investigate(&run).await;

        assert_eq!(outcome.status, RunStatus::Failed);
        let events = run.log.events_from(0);
        let last = events.last().unwrap();
        assert_eq!(last.event_type, EventType::Error);
        assert_eq!(last.data.category, Some(ErrorCategory::Cancelled));
    }

    #[tokio::test]
    async fn test_failed_candidate_is_not_retried() {
        // Discovery finds two bridges; the stronger one never verifies, so
        // the orchestrator moves to the second.
        let search = ScriptedImageSearch::new()
            .on(
                "Alpha One photo",
                vec![
                    hit("https://img/ax.jpg", "https://page/ax"),
                    hit("https://img/ay.jpg", "https://page/ay"),
                ],
            )
            .on("Alpha One Strong Decoy", Vec::new())
            .on("Alpha One Real Bridge", vec![hit("https://img/ar.jpg", "https://page/ar")])
            .on("Real Bridge Beta Two", vec![hit("https://img/rb.jpg", "https://page/rb")]);
        let recognizer = ScriptedFaceRecognizer::new()
            .on("ax.jpg", vec![face("Alpha One", 96.0), face("Strong Decoy", 99.0)])
            .on("ay.jpg", vec![face("Alpha One", 96.0), face("Real Bridge", 90.0)])
            .on("ar.jpg", vec![face("Alpha One", 95.0), face("Real Bridge", 92.0)])
            .on("rb.jpg", vec![face("Real Bridge", 94.0), face("Beta Two", 89.0)]);
        let store = in_memory_store().await;
        let orchestrator = orchestrator_with(
            search,
            recognizer,
            ScriptedVisionFilter::accepting_all(),
            ScriptedPlanner::new(),
            store,
            EngineConfig::default(),
        );

        let run = RunHandle::new("Alpha One", "Beta Two");
        let outcome = orchestrator.investigate(&run).await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(
            outcome.path,
            vec![
                "Alpha One".to_string(),
                "Real Bridge".to_string(),
                "Beta Two".to_string()
            ]
        );
        // The decoy was attempted once and marked failed.
        let failed_steps = run
            .log
            .events_from(0)
            .iter()
            .filter(|e| {
                e.event_type == EventType::StepComplete
                    && e.data.step_id == Some(StepId::VerifyBridge)
                    && e.data.step_status == Some(StepStatus::Failed)
            })
            .count();
        assert_eq!(failed_steps, 1);
    }
}
