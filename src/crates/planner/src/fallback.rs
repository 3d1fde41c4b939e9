//! Deterministic fallbacks for every planner entry point.
//!
//! These run when no LLM is configured, when the LLM budget is exhausted,
//! and when a model response fails schema or semantic validation.

use crate::{CandidateBrief, ExpansionChoice, ExpansionInput, ParsedQuery, Research, StrategicRanking};
use domain::names_match;
use regex::Regex;
use std::sync::OnceLock;

/// Patterns tried in order against free text; the first capture wins.
fn query_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)^\s*connect\s+(.+?)\s+(?:to|and|with)\s+(.+?)\s*\??\s*$",
            r"(?i)^\s*how\s+is\s+(.+?)\s+connected\s+to\s+(.+?)\s*\??\s*$",
            r"(?i)^\s*(.+?)\s+to\s+(.+?)\s*\??\s*$",
            r"(?i)^\s*(.+?)\s+and\s+(.+?)\s*\??\s*$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static pattern compiles"))
        .collect()
    })
}

/// Regex extraction of two names from free text.
pub fn parse_query(text: &str) -> ParsedQuery {
    for pattern in query_patterns() {
        if let Some(caps) = pattern.captures(text) {
            let a = caps[1].trim().to_string();
            let b = caps[2].trim().to_string();
            if a.is_empty() || b.is_empty() {
                continue;
            }
            if names_match(&a, &b).is_some() {
                return ParsedQuery::invalid("both names refer to the same person");
            }
            return ParsedQuery {
                person_a: a,
                person_b: b,
                is_valid: true,
                confidence: 60,
                reason: None,
            };
        }
    }
    ParsedQuery::invalid("could not find two names; try \"connect X to Y\"")
}

/// Minimal research stub: no background knowledge, a couple of generic
/// pairing queries.
pub fn research_connection(a: &str, b: &str) -> Research {
    Research {
        summary: format!("No background research available for {} and {}", a, b),
        suggested_queries: vec![format!("{} {}", a, b), format!("{} {} photo", a, b)],
        confidence: 10,
        reasoning: "fallback research".to_string(),
        ..Default::default()
    }
}

/// Candidates in their incoming order (already confidence-sorted upstream).
pub fn rank_candidates(_target: &str, candidates: &[CandidateBrief]) -> StrategicRanking {
    StrategicRanking {
        ranked_candidates: candidates.iter().map(|c| c.name.clone()).collect(),
        strategy: "strongest co-appearance first".to_string(),
        hypothesis: String::new(),
    }
}

/// Generic frontier-to-target queries.
pub fn smart_queries(frontier: &str, target: &str) -> Vec<String> {
    vec![
        format!("{} {}", frontier, target),
        format!("{} {} photo", frontier, target),
        format!("{} {} event", frontier, target),
    ]
}

/// Fixed discovery queries around the frontier.
pub fn frontier_queries(frontier: &str) -> Vec<String> {
    vec![format!("{} photo", frontier), format!("{} with", frontier)]
}

/// Pick the top candidate not yet failed, ordered by confidence then count.
pub fn select_next_expansion(input: &ExpansionInput) -> ExpansionChoice {
    let mut viable: Vec<&CandidateBrief> = input
        .candidates
        .iter()
        .filter(|c| {
            !input
                .failed_candidates
                .iter()
                .any(|f| names_match(f, &c.name).is_some())
        })
        .collect();
    viable.sort_by(|a, b| {
        b.best_confidence
            .cmp(&a.best_confidence)
            .then(b.co_appear_count.cmp(&a.co_appear_count))
    });

    match viable.first() {
        Some(best) => ExpansionChoice {
            next_candidates: vec![best.name.clone()],
            search_queries: Vec::new(),
            narration: format!("Verifying {} next", best.name),
            stop: false,
            reason: "highest-confidence co-appearance".to_string(),
        },
        None => ExpansionChoice {
            next_candidates: Vec::new(),
            search_queries: Vec::new(),
            narration: String::new(),
            stop: true,
            reason: "no viable candidates remain".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect_to() {
        let q = parse_query("connect Elon Musk to Beyonce");
        assert!(q.is_valid);
        assert_eq!(q.person_a, "Elon Musk");
        assert_eq!(q.person_b, "Beyonce");
    }

    #[test]
    fn test_parse_how_is_connected() {
        let q = parse_query("How is Taylor Swift connected to Barack Obama?");
        assert!(q.is_valid);
        assert_eq!(q.person_a, "Taylor Swift");
        assert_eq!(q.person_b, "Barack Obama");
    }

    #[test]
    fn test_parse_x_to_y() {
        let q = parse_query("Elon Musk to Beyonce");
        assert!(q.is_valid);
        assert_eq!(q.person_a, "Elon Musk");
    }

    #[test]
    fn test_parse_x_and_y() {
        let q = parse_query("Rihanna and Jay-Z");
        assert!(q.is_valid);
        assert_eq!(q.person_b, "Jay-Z");
    }

    #[test]
    fn test_parse_rejects_same_person() {
        let q = parse_query("Barack Obama and Obama Barack");
        assert!(!q.is_valid);
    }

    #[test]
    fn test_parse_rejects_gibberish() {
        let q = parse_query("hello");
        assert!(!q.is_valid);
        assert!(q.reason.is_some());
    }

    #[test]
    fn test_frontier_queries_shape() {
        let queries = frontier_queries("Rihanna");
        assert_eq!(queries, vec!["Rihanna photo".to_string(), "Rihanna with".to_string()]);
    }

    fn input_with(candidates: Vec<CandidateBrief>, failed: Vec<String>) -> ExpansionInput {
        ExpansionInput {
            frontier: "A".to_string(),
            target: "B".to_string(),
            candidates,
            failed_candidates: failed,
            search_remaining: 10,
            recognition_remaining: 50,
            llm_remaining: 5,
            hop_depth: 0,
        }
    }

    #[test]
    fn test_select_prefers_confidence_then_count() {
        let input = input_with(
            vec![
                CandidateBrief { name: "Low".to_string(), best_confidence: 85, co_appear_count: 9 },
                CandidateBrief { name: "HighFew".to_string(), best_confidence: 95, co_appear_count: 1 },
                CandidateBrief { name: "HighMany".to_string(), best_confidence: 95, co_appear_count: 4 },
            ],
            vec![],
        );
        let choice = select_next_expansion(&input);
        assert_eq!(choice.next_candidates, vec!["HighMany".to_string()]);
        assert!(!choice.stop);
    }

    #[test]
    fn test_select_skips_failed_candidates() {
        let input = input_with(
            vec![
                CandidateBrief { name: "Rihanna".to_string(), best_confidence: 95, co_appear_count: 2 },
                CandidateBrief { name: "Jay-Z".to_string(), best_confidence: 90, co_appear_count: 1 },
            ],
            vec!["rihanna".to_string()],
        );
        let choice = select_next_expansion(&input);
        assert_eq!(choice.next_candidates, vec!["Jay-Z".to_string()]);
    }

    #[test]
    fn test_select_stops_when_everything_failed() {
        let input = input_with(
            vec![CandidateBrief { name: "Rihanna".to_string(), best_confidence: 95, co_appear_count: 2 }],
            vec!["Rihanna".to_string()],
        );
        let choice = select_next_expansion(&input);
        assert!(choice.stop);
        assert!(choice.next_candidates.is_empty());
    }
}
