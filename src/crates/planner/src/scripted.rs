//! Scripted planner for tests.
//!
//! Canned answers per entry point with a call log. Unscripted entry points
//! defer to the deterministic fallbacks, so a test only scripts what it
//! asserts on.

use crate::{
    fallback, BridgeSuggestion, CandidateBrief, ExpansionChoice, ExpansionInput, ImageVerification,
    ParsedQuery, Planner, Research, StrategicRanking,
};
use async_trait::async_trait;
use oracles::SceneCheck;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Planner with scripted responses and a call log.
#[derive(Default)]
pub struct ScriptedPlanner {
    research_capable: bool,
    parse_answers: Mutex<HashMap<String, ParsedQuery>>,
    research: Mutex<Option<Research>>,
    suggestions: Mutex<Vec<BridgeSuggestion>>,
    expansions: Mutex<Vec<ExpansionChoice>>,
    verifications: Mutex<HashMap<String, ImageVerification>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedPlanner {
    /// Create a scripted planner without research capability.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scripted planner that reports research capability.
    pub fn intelligent() -> Self {
        Self {
            research_capable: true,
            ..Self::default()
        }
    }

    /// Script the parse result for an exact input text.
    pub fn on_parse(self, text: impl Into<String>, answer: ParsedQuery) -> Self {
        self.parse_answers.lock().insert(text.into(), answer);
        self
    }

    /// Script the research answer.
    pub fn with_research(self, research: Research) -> Self {
        *self.research.lock() = Some(research);
        self
    }

    /// Script the bridge suggestions.
    pub fn with_suggestions(self, suggestions: Vec<BridgeSuggestion>) -> Self {
        *self.suggestions.lock() = suggestions;
        self
    }

    /// Queue an expansion choice; choices are consumed in order, after which
    /// selection falls back to the deterministic rule.
    pub fn push_expansion(self, choice: ExpansionChoice) -> Self {
        self.expansions.lock().push(choice);
        self
    }

    /// Script the image verification for URLs containing `key`.
    pub fn on_verification(self, key: impl Into<String>, v: ImageVerification) -> Self {
        self.verifications.lock().insert(key.into(), v);
        self
    }

    /// Entry points invoked so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, name: &str) {
        self.calls.lock().push(name.to_string());
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    fn supports_research(&self) -> bool {
        self.research_capable
    }

    async fn parse_query(&self, text: &str) -> ParsedQuery {
        self.record("parse_query");
        self.parse_answers
            .lock()
            .get(text)
            .cloned()
            .unwrap_or_else(|| fallback::parse_query(text))
    }

    async fn research_connection(&self, a: &str, b: &str) -> Research {
        self.record("research_connection");
        self.research
            .lock()
            .clone()
            .unwrap_or_else(|| fallback::research_connection(a, b))
    }

    async fn suggest_bridge_candidates(
        &self,
        _a: &str,
        _b: &str,
        exclude: &[String],
    ) -> Vec<BridgeSuggestion> {
        self.record("suggest_bridge_candidates");
        self.suggestions
            .lock()
            .iter()
            .filter(|s| !exclude.iter().any(|e| domain::names_match(e, &s.name).is_some()))
            .cloned()
            .collect()
    }

    async fn rank_candidates_strategically(
        &self,
        _frontier: &str,
        target: &str,
        candidates: &[CandidateBrief],
        _research: Option<&Research>,
    ) -> StrategicRanking {
        self.record("rank_candidates_strategically");
        fallback::rank_candidates(target, candidates)
    }

    async fn generate_smart_queries(
        &self,
        frontier: &str,
        target: &str,
        _research: Option<&Research>,
    ) -> Vec<String> {
        self.record("generate_smart_queries");
        fallback::smart_queries(frontier, target)
    }

    async fn generate_frontier_queries(&self, frontier: &str) -> Vec<String> {
        self.record("generate_frontier_queries");
        fallback::frontier_queries(frontier)
    }

    async fn select_next_expansion(&self, input: &ExpansionInput) -> ExpansionChoice {
        self.record("select_next_expansion");
        let mut queued = self.expansions.lock();
        if queued.is_empty() {
            fallback::select_next_expansion(input)
        } else {
            queued.remove(0)
        }
    }

    async fn verify_celebrities_in_image(
        &self,
        image_url: &str,
        _a: &str,
        _b: &str,
    ) -> Option<ImageVerification> {
        self.record("verify_celebrities_in_image");
        let verifications = self.verifications.lock();
        if let Some(v) = verifications.get(image_url) {
            return Some(v.clone());
        }
        verifications
            .iter()
            .find(|(k, _)| image_url.contains(k.as_str()))
            .map(|(_, v)| v.clone())
    }

    async fn is_single_scene(&self, _image_url: &str) -> SceneCheck {
        self.record("is_single_scene");
        SceneCheck {
            valid: true,
            reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_parse_falls_back_when_unscripted() {
        let planner = ScriptedPlanner::new();
        let parsed = planner.parse_query("connect A to B").await;
        assert!(parsed.is_valid);
        assert_eq!(planner.calls(), vec!["parse_query".to_string()]);
    }

    #[tokio::test]
    async fn test_scripted_expansions_consumed_in_order() {
        let planner = ScriptedPlanner::new()
            .push_expansion(ExpansionChoice {
                next_candidates: vec!["M".to_string()],
                ..Default::default()
            })
            .push_expansion(ExpansionChoice {
                stop: true,
                ..Default::default()
            });

        let input = ExpansionInput {
            frontier: "A".to_string(),
            target: "B".to_string(),
            candidates: vec![],
            failed_candidates: vec![],
            search_remaining: 1,
            recognition_remaining: 1,
            llm_remaining: 1,
            hop_depth: 0,
        };

        let first = planner.select_next_expansion(&input).await;
        assert_eq!(first.next_candidates, vec!["M".to_string()]);
        let second = planner.select_next_expansion(&input).await;
        assert!(second.stop);
    }

    #[tokio::test]
    async fn test_scripted_suggestions_respect_exclusions() {
        let planner = ScriptedPlanner::intelligent().with_suggestions(vec![
            BridgeSuggestion {
                name: "Rihanna".to_string(),
                reasoning: String::new(),
                connection_to_a: String::new(),
                connection_to_b: String::new(),
                confidence: 80,
            },
            BridgeSuggestion {
                name: "Jay-Z".to_string(),
                reasoning: String::new(),
                connection_to_a: String::new(),
                connection_to_b: String::new(),
                confidence: 70,
            },
        ]);

        let suggestions = planner
            .suggest_bridge_candidates("A", "B", &["rihanna".to_string()])
            .await;
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].name, "Jay-Z");
    }
}
