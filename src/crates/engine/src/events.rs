//! Structured run events.
//!
//! Every observable transition of an investigation becomes one append-only
//! [`RunEvent`]. The `index` is the only subscriber cursor; `data.event_id`
//! lets clients deduplicate across reconnects. Serialising then parsing an
//! event preserves all enumerated fields.

use crate::budget::BudgetSnapshot;
use oracles::FaceDetection;
use serde::{Deserialize, Serialize};

/// Enumerated event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StepStart,
    StepUpdate,
    StepComplete,
    Research,
    Thinking,
    Strategy,
    StrategyUpdate,
    CandidateDiscovery,
    LlmSelection,
    ImageResult,
    Evidence,
    PathUpdate,
    Backtrack,
    Status,
    Final,
    NoPath,
    Error,
}

impl EventType {
    /// True for the event types that end a run.
    pub fn is_terminal(self) -> bool {
        matches!(self, EventType::Final | EventType::NoPath | EventType::Error)
    }

    /// Wire name of the type.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::StepStart => "step_start",
            EventType::StepUpdate => "step_update",
            EventType::StepComplete => "step_complete",
            EventType::Research => "research",
            EventType::Thinking => "thinking",
            EventType::Strategy => "strategy",
            EventType::StrategyUpdate => "strategy_update",
            EventType::CandidateDiscovery => "candidate_discovery",
            EventType::LlmSelection => "llm_selection",
            EventType::ImageResult => "image_result",
            EventType::Evidence => "evidence",
            EventType::PathUpdate => "path_update",
            EventType::Backtrack => "backtrack",
            EventType::Status => "status",
            EventType::Final => "final",
            EventType::NoPath => "no_path",
            EventType::Error => "error",
        }
    }
}

/// Enumerated investigation steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    DirectCheck,
    FindBridges,
    VerifyBridge,
    ConnectTarget,
}

/// Lifecycle of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Failed,
    Skipped,
}

/// Error categories surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    IntegrationError,
    Timeout,
    Cancelled,
    ValidationError,
    Unknown,
}

/// Per-image analysis outcome carried on `image_result` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    /// Rejected by the scene filter
    Collage,
    /// Both targets not confidently recognised
    NoMatch,
    /// Both targets recognised at or above the threshold
    Evidence,
    /// Fetch or oracle failure for this image
    Error,
}

/// Edge summary carried on `evidence` events and graph pushes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSummary {
    pub from: String,
    pub to: String,
    pub confidence: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_url: Option<String>,
}

/// Payload of the terminal `final` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinalOutcome {
    /// Display names, endpoints included
    pub path: Vec<String>,
    pub steps: Vec<EdgeSummary>,
    /// Bottleneck confidence over the path
    pub min_confidence: u8,
    /// Product of per-edge probabilities
    pub cumulative_confidence: f64,
    pub disclaimer: String,
}

/// Wording attached to every successful result.
pub const DISCLAIMER: &str =
    "shows visual co-presence, not necessarily a personal relationship";

/// Optional-field bag carried by every event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_status: Option<StepStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_person: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_person: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<planner::CandidateBrief>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_images: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ImageStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub celebrities: Option<Vec<FaceDetection>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge: Option<EdgeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hop_depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_pct: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<FinalOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
}

impl EventData {
    /// Empty data bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step fields.
    pub fn with_step(mut self, step_id: StepId, status: StepStatus) -> Self {
        self.step_id = Some(step_id);
        self.step_status = Some(status);
        self
    }

    /// Set the edge endpoints.
    pub fn with_pair(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from_person = Some(from.into());
        self.to_person = Some(to.into());
        self
    }

    /// Set the frontier.
    pub fn with_frontier(mut self, frontier: impl Into<String>) -> Self {
        self.frontier = Some(frontier.into());
        self
    }

    /// Set the per-image fields.
    pub fn with_image(mut self, url: impl Into<String>, status: ImageStatus) -> Self {
        self.image_url = Some(url.into());
        self.status = Some(status);
        self
    }

    /// Set the budget snapshot.
    pub fn with_budget(mut self, budget: BudgetSnapshot) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Set the current path.
    pub fn with_path(mut self, path: Vec<String>) -> Self {
        self.path = Some(path);
        self
    }

    /// Set the reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// One record of a run's append-only event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunEvent {
    /// Strictly increasing position in the log, the subscriber cursor
    pub index: u64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(rename = "runId")]
    pub run_id: String,
    /// RFC 3339 emission time
    pub timestamp: String,
    /// Human-readable one-liner
    pub message: String,
    pub data: EventData,
}
