//! Per-run oracle budgets.
//!
//! Budget decrements are atomic check-and-increment operations, so the
//! bounded per-image fan-out can never overshoot a declared maximum even
//! when several analyses race for the last call of a tier.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

/// The three metered oracle tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetTier {
    /// Web image search calls
    Search,
    /// Face recognition calls
    Recognition,
    /// Planner and vision LLM calls
    Llm,
}

/// Atomic call counters for one run.
#[derive(Debug)]
pub struct Budgets {
    search_used: AtomicU32,
    search_max: u32,
    recognition_used: AtomicU32,
    recognition_max: u32,
    llm_used: AtomicU32,
    llm_max: u32,
}

/// Point-in-time view of the budgets, carried on events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSnapshot {
    pub search_used: u32,
    pub search_max: u32,
    pub recognition_used: u32,
    pub recognition_max: u32,
    pub llm_used: u32,
    pub llm_max: u32,
}

impl Budgets {
    /// Create budgets with the given maxima.
    pub fn new(search_max: u32, recognition_max: u32, llm_max: u32) -> Self {
        Self {
            search_used: AtomicU32::new(0),
            search_max,
            recognition_used: AtomicU32::new(0),
            recognition_max,
            llm_used: AtomicU32::new(0),
            llm_max,
        }
    }

    fn slot(&self, tier: BudgetTier) -> (&AtomicU32, u32) {
        match tier {
            BudgetTier::Search => (&self.search_used, self.search_max),
            BudgetTier::Recognition => (&self.recognition_used, self.recognition_max),
            BudgetTier::Llm => (&self.llm_used, self.llm_max),
        }
    }

    /// Reserve one call of the tier. Returns false without consuming when
    /// the tier is exhausted.
    pub fn try_consume(&self, tier: BudgetTier) -> bool {
        let (used, max) = self.slot(tier);
        used.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            if current < max {
                Some(current + 1)
            } else {
                None
            }
        })
        .is_ok()
    }

    /// True when no calls of the tier remain.
    pub fn exhausted(&self, tier: BudgetTier) -> bool {
        let (used, max) = self.slot(tier);
        used.load(Ordering::SeqCst) >= max
    }

    /// Calls of the tier still available.
    pub fn remaining(&self, tier: BudgetTier) -> u32 {
        let (used, max) = self.slot(tier);
        max.saturating_sub(used.load(Ordering::SeqCst))
    }

    /// Terminal condition: the run cannot make progress once search or
    /// recognition is spent.
    pub fn terminally_exhausted(&self) -> bool {
        self.exhausted(BudgetTier::Search) || self.exhausted(BudgetTier::Recognition)
    }

    /// Current snapshot for event payloads.
    pub fn snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            search_used: self.search_used.load(Ordering::SeqCst),
            search_max: self.search_max,
            recognition_used: self.recognition_used.load(Ordering::SeqCst),
            recognition_max: self.recognition_max,
            llm_used: self.llm_used.load(Ordering::SeqCst),
            llm_max: self.llm_max,
        }
    }
}
