//! Per-client investigation quota.
//!
//! Sliding window over the last 24 hours (configurable): each admission
//! records a timestamp, old timestamps fall out of the window on the next
//! check, and whitelisted clients bypass the quota entirely. Admission
//! decisions carry the remaining count and reset time for the response
//! headers.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::time::Duration;

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Request admitted; `remaining` counts requests left in the window.
    Allowed {
        remaining: u32,
        reset_at: DateTime<Utc>,
    },
    /// Quota spent; `reset_at` is when the oldest hit leaves the window.
    Denied { reset_at: DateTime<Utc> },
}

impl Admission {
    /// Requests left after this decision.
    pub fn remaining(&self) -> u32 {
        match self {
            Admission::Allowed { remaining, .. } => *remaining,
            Admission::Denied { .. } => 0,
        }
    }

    /// When the client's window resets.
    pub fn reset_at(&self) -> DateTime<Utc> {
        match self {
            Admission::Allowed { reset_at, .. } | Admission::Denied { reset_at } => *reset_at,
        }
    }

    /// True when the request was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

/// Sliding-window request limiter keyed by client address.
pub struct SlidingWindowLimiter {
    max: u32,
    window: ChronoDuration,
    whitelist: HashSet<String>,
    hits: DashMap<String, Vec<DateTime<Utc>>>,
}

impl SlidingWindowLimiter {
    /// Create a limiter allowing `max` admissions per `window`.
    pub fn new(max: u32, window: Duration, whitelist: HashSet<String>) -> Self {
        Self {
            max,
            window: ChronoDuration::from_std(window).unwrap_or(ChronoDuration::hours(24)),
            whitelist,
            hits: DashMap::new(),
        }
    }

    /// Check and record one admission for a client.
    pub fn check(&self, client: &str) -> Admission {
        let now = Utc::now();
        if self.whitelist.contains(client) {
            return Admission::Allowed {
                remaining: self.max,
                reset_at: now + self.window,
            };
        }

        let mut entry = self.hits.entry(client.to_string()).or_default();
        let cutoff = now - self.window;
        entry.retain(|t| *t > cutoff);

        if (entry.len() as u32) < self.max {
            entry.push(now);
            let reset_at = entry.first().copied().unwrap_or(now) + self.window;
            Admission::Allowed {
                remaining: self.max - entry.len() as u32,
                reset_at,
            }
        } else {
            let reset_at = entry.first().copied().unwrap_or(now) + self.window;
            Admission::Denied { reset_at }
        }
    }

    /// Remaining admissions for a client without recording one.
    pub fn remaining(&self, client: &str) -> u32 {
        if self.whitelist.contains(client) {
            return self.max;
        }
        let cutoff = Utc::now() - self.window;
        self.hits
            .get(client)
            .map(|hits| {
                let live = hits.iter().filter(|t| **t > cutoff).count() as u32;
                self.max.saturating_sub(live)
            })
            .unwrap_or(self.max)
    }

    /// The configured per-window maximum.
    pub fn max(&self) -> u32 {
        self.max
    }
}
