//! Strict parsing of model responses.
//!
//! Models wrap JSON in prose, markdown fences, and stray tokens. The helpers
//! here cut the first balanced JSON block out of a response, deserialize it
//! into the expected schema, and apply semantic validation. Any failure at
//! any stage sends the caller to its deterministic fallback.

use crate::error::{PlannerError, Result};
use crate::{CandidateBrief, ExpansionChoice};
use domain::names_match;
use serde::de::DeserializeOwned;

/// Extract the first balanced `{…}` or `[…]` block from a response.
///
/// Tracks string literals and escapes so braces inside strings do not
/// unbalance the scan.
pub fn extract_json_block(response: &str) -> Option<&str> {
    let start = response.find(|c| c == '{' || c == '[')?;
    let bytes = response.as_bytes();
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&response[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract and deserialize the first JSON block of a response, enforcing the
/// configured size cap.
pub fn parse_response<T: DeserializeOwned>(response: &str, max_bytes: usize) -> Result<T> {
    if response.len() > max_bytes {
        return Err(PlannerError::ResponseTooLarge(response.len()));
    }
    let block = extract_json_block(response).ok_or(PlannerError::NoJsonBlock)?;
    let value = serde_json::from_str(block)?;
    Ok(value)
}

/// Clamp a confidence-like number into `[0, 100]`.
pub fn clamp_confidence(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

/// Validate a parsed expansion choice against the candidates that were
/// actually offered.
///
/// Rejected unless every chosen name matches (by the domain rules) one of
/// the provided candidates and, for a non-stop choice, at least one
/// candidate was chosen. Caps are applied rather than rejected: at most 2
/// candidates and 4 queries survive.
pub fn validate_expansion(
    mut choice: ExpansionChoice,
    offered: &[CandidateBrief],
) -> Result<ExpansionChoice> {
    choice.next_candidates.truncate(2);
    choice.search_queries.truncate(4);

    if choice.stop {
        return Ok(choice);
    }
    if choice.next_candidates.is_empty() {
        return Err(PlannerError::ValidationFailed(
            "no candidates chosen and stop not set".to_string(),
        ));
    }
    for name in &choice.next_candidates {
        let known = offered.iter().any(|c| names_match(&c.name, name).is_some());
        if !known {
            return Err(PlannerError::ValidationFailed(format!(
                "chosen candidate {:?} was not offered",
                name
            )));
        }
    }
    Ok(choice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_object() {
        let response = r#"Sure! Here is the answer: {"a": 1, "b": "x"} hope that helps"#;
        assert_eq!(extract_json_block(response), Some(r#"{"a": 1, "b": "x"}"#));
    }

    #[test]
    fn test_extract_nested_object_with_braces_in_strings() {
        let response = r#"{"text": "a } brace", "inner": {"k": 2}}"#;
        assert_eq!(extract_json_block(response), Some(response));
    }

    #[test]
    fn test_extract_array() {
        let response = "here you go [1, 2, 3] done";
        assert_eq!(extract_json_block(response), Some("[1, 2, 3]"));
    }

    #[test]
    fn test_extract_from_markdown_fence() {
        let response = "```json\n{\"ok\": true}\n```";
        assert_eq!(extract_json_block(response), Some("{\"ok\": true}"));
    }

    #[test]
    fn test_extract_none_when_unbalanced() {
        assert_eq!(extract_json_block("{\"a\": 1"), None);
        assert_eq!(extract_json_block("no json here"), None);
    }

    #[test]
    fn test_parse_response_size_cap() {
        let err = parse_response::<serde_json::Value>(&"x".repeat(100), 10).unwrap_err();
        assert!(matches!(err, PlannerError::ResponseTooLarge(100)));
    }

    #[test]
    fn test_clamp_confidence() {
        assert_eq!(clamp_confidence(-5), 0);
        assert_eq!(clamp_confidence(150), 100);
        assert_eq!(clamp_confidence(80), 80);
    }

    fn offered() -> Vec<CandidateBrief> {
        vec![
            CandidateBrief {
                name: "Rihanna".to_string(),
                best_confidence: 92,
                co_appear_count: 3,
            },
            CandidateBrief {
                name: "Jay-Z".to_string(),
                best_confidence: 88,
                co_appear_count: 1,
            },
        ]
    }

    #[test]
    fn test_validate_expansion_accepts_offered_names() {
        let choice = ExpansionChoice {
            next_candidates: vec!["rihanna".to_string()],
            ..Default::default()
        };
        let validated = validate_expansion(choice, &offered()).unwrap();
        assert_eq!(validated.next_candidates, vec!["rihanna".to_string()]);
    }

    #[test]
    fn test_validate_expansion_rejects_unknown_names() {
        let choice = ExpansionChoice {
            next_candidates: vec!["Drake".to_string()],
            ..Default::default()
        };
        assert!(validate_expansion(choice, &offered()).is_err());
    }

    #[test]
    fn test_validate_expansion_rejects_empty_non_stop() {
        let choice = ExpansionChoice::default();
        assert!(validate_expansion(choice, &offered()).is_err());
    }

    #[test]
    fn test_validate_expansion_allows_empty_stop() {
        let choice = ExpansionChoice {
            stop: true,
            reason: "budgets nearly spent".to_string(),
            ..Default::default()
        };
        assert!(validate_expansion(choice, &offered()).is_ok());
    }

    #[test]
    fn test_validate_expansion_truncates_caps() {
        let choice = ExpansionChoice {
            next_candidates: vec![
                "Rihanna".to_string(),
                "Jay-Z".to_string(),
                "Rihanna".to_string(),
            ],
            search_queries: (0..6).map(|i| format!("q{}", i)).collect(),
            ..Default::default()
        };
        let validated = validate_expansion(choice, &offered()).unwrap();
        assert_eq!(validated.next_candidates.len(), 2);
        assert_eq!(validated.search_queries.len(), 4);
    }
}
