//! Engine configuration.

use std::time::Duration;

/// Tunable knobs for an investigation run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum verified hops before the search gives up.
    pub hop_limit: u32,

    /// Recognition confidence required for a detection to count, in
    /// `[0, 100]`. A detection at exactly the threshold is accepted.
    pub confidence_threshold: u8,

    /// Images taken from each search query.
    pub images_per_query: usize,

    /// Concurrent per-image analyses inside one query.
    pub fan_out: usize,

    /// Search calls allowed per run.
    pub search_budget: u32,

    /// Recognition calls allowed per run.
    pub recognition_budget: u32,

    /// Planner/vision LLM calls allowed per run.
    pub llm_budget: u32,

    /// Discovery stops early once this many candidates reach
    /// `early_stop_confidence`.
    pub early_stop_candidates: usize,

    /// Confidence a candidate needs to count toward the early stop.
    pub early_stop_confidence: u8,

    /// Queries attempted per discovery round.
    pub max_queries_per_hop: usize,

    /// Accepted evidence images after which edge verification stops.
    pub max_evidence_images: usize,

    /// Verification queries generated per candidate edge.
    pub verification_queries: usize,

    /// How long a finished run and its event log stay addressable.
    pub run_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hop_limit: 6,
            confidence_threshold: 80,
            images_per_query: 5,
            fan_out: 5,
            search_budget: 20,
            recognition_budget: 100,
            llm_budget: 15,
            early_stop_candidates: 2,
            early_stop_confidence: 90,
            max_queries_per_hop: 8,
            max_evidence_images: 3,
            verification_queries: 2,
            run_ttl: Duration::from_secs(3600),
        }
    }
}

impl EngineConfig {
    /// Build configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            hop_limit: env_parse("HOP_LIMIT", defaults.hop_limit),
            confidence_threshold: env_parse("CONFIDENCE_THRESHOLD", defaults.confidence_threshold),
            images_per_query: env_parse("IMAGES_PER_QUERY", defaults.images_per_query),
            search_budget: env_parse("SEARCH_BUDGET", defaults.search_budget),
            recognition_budget: env_parse("RECOG_BUDGET", defaults.recognition_budget),
            llm_budget: env_parse("LLM_BUDGET", defaults.llm_budget),
            early_stop_candidates: env_parse("EARLY_STOP_CANDIDATES", defaults.early_stop_candidates),
            early_stop_confidence: env_parse("EARLY_STOP_CONFIDENCE", defaults.early_stop_confidence),
            run_ttl: Duration::from_secs(env_parse("RUN_TTL_SECS", 3600u64)),
            ..defaults
        }
    }

    /// Set the per-run budgets.
    pub fn with_budgets(mut self, search: u32, recognition: u32, llm: u32) -> Self {
        self.search_budget = search;
        self.recognition_budget = recognition;
        self.llm_budget = llm;
        self
    }

    /// Set the recognition confidence threshold.
    pub fn with_confidence_threshold(mut self, threshold: u8) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the hop limit.
    pub fn with_hop_limit(mut self, hop_limit: u32) -> Self {
        self.hop_limit = hop_limit;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
