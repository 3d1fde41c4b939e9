//! Investigation engine for lenslink.
//!
//! One investigation run is a budget-aware state machine that composes the
//! image search, face recognition, and vision oracles under an LLM planner,
//! streams every observable transition to its per-run event log, and commits
//! verified co-appearances into the shared graph store.

pub mod budget;
pub mod bus;
pub mod candidates;
pub mod config;
pub mod events;
pub mod orchestrator;
pub mod verify;

pub use budget::{BudgetSnapshot, BudgetTier, Budgets};
pub use bus::{EdgeUpdate, GraphBroadcaster, RunHandle, RunLog, RunRegistry, RunStatus};
pub use candidates::{aggregate_candidates, CandidateRecord};
pub use config::EngineConfig;
pub use events::{
    EdgeSummary, ErrorCategory, EventData, EventType, FinalOutcome, ImageStatus, RunEvent, StepId,
    StepStatus, DISCLAIMER,
};
pub use orchestrator::{InvestigationOutcome, Orchestrator};
pub use verify::{EvidenceImage, VerificationPipeline, VerifiedEdge};

use thiserror::Error;

/// Errors that can occur inside the engine.
///
/// Most failures degrade in place (an unreadable image becomes an
/// `image_result` error event, a planner failure becomes a fallback); these
/// variants surface only where the run itself cannot continue.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Oracle integration failure
    #[error("Oracle failure: {0}")]
    Oracle(#[from] oracles::OracleError),

    /// Graph persistence failure
    #[error("Graph store failure: {0}")]
    Store(#[from] graphstore::GraphStoreError),

    /// Run was cancelled
    #[error("Run cancelled")]
    Cancelled,

    /// Invalid investigation input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
