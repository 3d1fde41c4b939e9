//! LLM planner adapter for lenslink.
//!
//! Every planner entry point has the same shape: attempt a schema-bound LLM
//! call with timeout and size limits, extract the first JSON block from the
//! response, validate it against the expected schema, and on any failure
//! return a deterministic fallback. [`BasicPlanner`] is the fallback set on
//! its own; [`LlmPlanner`] layers a chat-completions model on top and
//! reports `supports_research() == true` so the orchestrator can enable the
//! research and strategy states.

pub mod config;
pub mod error;
pub mod fallback;
pub mod llm;
pub mod parse;
pub mod prompts;
pub mod scripted;

pub use config::PlannerConfig;
pub use error::{PlannerError, Result};
pub use llm::LlmPlanner;
pub use scripted::ScriptedPlanner;

use async_trait::async_trait;
use oracles::SceneCheck;
use serde::{Deserialize, Serialize};

/// Two names extracted from free text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuery {
    pub person_a: String,
    pub person_b: String,
    pub is_valid: bool,
    /// Extraction confidence in `[0, 100]`
    pub confidence: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ParsedQuery {
    /// An invalid parse with an explanatory reason.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            person_a: String::new(),
            person_b: String::new(),
            is_valid: false,
            confidence: 0,
            reason: Some(reason.into()),
        }
    }
}

/// Background research on how two people might plausibly connect.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Research {
    pub summary: String,
    #[serde(default)]
    pub industries: Vec<String>,
    #[serde(default)]
    pub event_types: Vec<String>,
    #[serde(default)]
    pub bridge_types: Vec<String>,
    #[serde(default)]
    pub suggested_queries: Vec<String>,
    #[serde(default)]
    pub confidence: u8,
    #[serde(default)]
    pub reasoning: String,
}

/// A proposed intermediate person.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BridgeSuggestion {
    pub name: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub connection_to_a: String,
    #[serde(default)]
    pub connection_to_b: String,
    #[serde(default)]
    pub confidence: u8,
}

/// Candidate summary handed to the planner for ranking and selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateBrief {
    pub name: String,
    pub best_confidence: u8,
    pub co_appear_count: u32,
}

/// Strategic ordering of candidates toward the target.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrategicRanking {
    pub ranked_candidates: Vec<String>,
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub hypothesis: String,
}

/// Everything the planner sees when choosing the next expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionInput {
    pub frontier: String,
    pub target: String,
    pub candidates: Vec<CandidateBrief>,
    pub failed_candidates: Vec<String>,
    pub search_remaining: u32,
    pub recognition_remaining: u32,
    pub llm_remaining: u32,
    pub hop_depth: u32,
}

/// The planner's decision on how to continue the investigation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionChoice {
    /// Candidates to verify next, at most 2, best first
    pub next_candidates: Vec<String>,
    /// Additional searches to run, at most 4
    #[serde(default)]
    pub search_queries: Vec<String>,
    /// One-line narration for the event stream
    #[serde(default)]
    pub narration: String,
    /// True when the planner sees no viable continuation
    #[serde(default)]
    pub stop: bool,
    #[serde(default)]
    pub reason: String,
}

/// LLM second opinion on whether both targets appear together in an image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageVerification {
    pub person_a_found: bool,
    pub person_a_confidence: u8,
    pub person_b_found: bool,
    pub person_b_confidence: u8,
    pub together_in_scene: bool,
    pub overall_confidence: u8,
    #[serde(default)]
    pub notes: String,
}

/// Planner abstraction consumed by the orchestrator.
///
/// Implementations never fail outward: an LLM error or schema mismatch
/// resolves to the deterministic fallback for that entry point.
#[async_trait]
pub trait Planner: Send + Sync {
    /// True when this planner can research connections and rank candidates
    /// strategically. The orchestrator degrades to the basic flow otherwise.
    fn supports_research(&self) -> bool {
        false
    }

    /// Extract two person names from free text.
    async fn parse_query(&self, text: &str) -> ParsedQuery;

    /// Research how `a` and `b` might plausibly connect.
    async fn research_connection(&self, a: &str, b: &str) -> Research;

    /// Brainstorm up to 10 bridge candidates, excluding the given names.
    async fn suggest_bridge_candidates(
        &self,
        a: &str,
        b: &str,
        exclude: &[String],
    ) -> Vec<BridgeSuggestion>;

    /// Order discovered candidates by strategic value toward the target.
    async fn rank_candidates_strategically(
        &self,
        frontier: &str,
        target: &str,
        candidates: &[CandidateBrief],
        research: Option<&Research>,
    ) -> StrategicRanking;

    /// Generate research-informed search queries from frontier toward target.
    async fn generate_smart_queries(
        &self,
        frontier: &str,
        target: &str,
        research: Option<&Research>,
    ) -> Vec<String>;

    /// Generate generic discovery queries around the frontier.
    async fn generate_frontier_queries(&self, frontier: &str) -> Vec<String>;

    /// Choose the next candidates to verify, or stop.
    async fn select_next_expansion(&self, input: &ExpansionInput) -> ExpansionChoice;

    /// Second-opinion check that both targets appear together in an image.
    /// `None` means the planner has no opinion.
    async fn verify_celebrities_in_image(
        &self,
        image_url: &str,
        a: &str,
        b: &str,
    ) -> Option<ImageVerification>;

    /// Vision check that an image is one photographic scene.
    async fn is_single_scene(&self, image_url: &str) -> SceneCheck;
}

/// Adapter exposing a planner's vision check as the scene-filter oracle.
pub struct PlannerVision(pub std::sync::Arc<dyn Planner>);

#[async_trait]
impl oracles::VisionFilter for PlannerVision {
    async fn is_single_scene(&self, image_url: &str) -> oracles::Result<SceneCheck> {
        Ok(self.0.is_single_scene(image_url).await)
    }
}

/// Fallback-only planner: zero LLM calls, deterministic output.
#[derive(Debug, Default, Clone)]
pub struct BasicPlanner;

impl BasicPlanner {
    /// Create a new basic planner.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Planner for BasicPlanner {
    async fn parse_query(&self, text: &str) -> ParsedQuery {
        fallback::parse_query(text)
    }

    async fn research_connection(&self, a: &str, b: &str) -> Research {
        fallback::research_connection(a, b)
    }

    async fn suggest_bridge_candidates(
        &self,
        _a: &str,
        _b: &str,
        _exclude: &[String],
    ) -> Vec<BridgeSuggestion> {
        Vec::new()
    }

    async fn rank_candidates_strategically(
        &self,
        _frontier: &str,
        target: &str,
        candidates: &[CandidateBrief],
        _research: Option<&Research>,
    ) -> StrategicRanking {
        fallback::rank_candidates(target, candidates)
    }

    async fn generate_smart_queries(
        &self,
        frontier: &str,
        target: &str,
        _research: Option<&Research>,
    ) -> Vec<String> {
        fallback::smart_queries(frontier, target)
    }

    async fn generate_frontier_queries(&self, frontier: &str) -> Vec<String> {
        fallback::frontier_queries(frontier)
    }

    async fn select_next_expansion(&self, input: &ExpansionInput) -> ExpansionChoice {
        fallback::select_next_expansion(input)
    }

    async fn verify_celebrities_in_image(
        &self,
        _image_url: &str,
        _a: &str,
        _b: &str,
    ) -> Option<ImageVerification> {
        None
    }

    async fn is_single_scene(&self, _image_url: &str) -> SceneCheck {
        SceneCheck {
            valid: true,
            reason: None,
        }
    }
}
