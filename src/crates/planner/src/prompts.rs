//! Prompt builders for planner entry points.
//!
//! Each builder returns the user prompt for one schema-bound call. The
//! system prompt pins the model to bare-JSON answers so the parser's
//! first-block extraction is cheap.

use crate::{CandidateBrief, ExpansionInput, Research};

/// System prompt shared by all text entry points.
pub const SYSTEM: &str = "You are the planning module of an investigation engine that connects \
public figures through verified photographs. Respond with a single JSON object matching the \
requested schema and nothing else. Use only real, well-known public figures.";

/// Prompt for extracting two names from free text.
pub fn parse_query(text: &str) -> String {
    format!(
        "Extract the two people the user wants to connect from this message:\n\
         {:?}\n\n\
         Schema: {{\"personA\": string, \"personB\": string, \"isValid\": boolean, \
         \"confidence\": number 0-100, \"reason\": string optional}}\n\
         Set isValid false when there are not exactly two distinct people.",
        text
    )
}

/// Prompt for researching a connection between two people.
pub fn research_connection(a: &str, b: &str) -> String {
    format!(
        "Research how {} and {} might be visually connected through public photographs.\n\n\
         Schema: {{\"summary\": string, \"industries\": [string], \"eventTypes\": [string], \
         \"bridgeTypes\": [string], \"suggestedQueries\": [string], \"confidence\": number 0-100, \
         \"reasoning\": string}}",
        a, b
    )
}

/// Prompt for brainstorming bridge candidates.
pub fn suggest_bridge_candidates(a: &str, b: &str, exclude: &[String]) -> String {
    format!(
        "Suggest up to 10 people likely to appear in photographs with BOTH {} and {}. \
         Exclude: {}.\n\n\
         Schema: {{\"candidates\": [{{\"name\": string, \"reasoning\": string, \
         \"connectionToA\": string, \"connectionToB\": string, \"confidence\": number 0-100}}]}}",
        a,
        b,
        if exclude.is_empty() { "nobody".to_string() } else { exclude.join(", ") }
    )
}

/// Prompt for strategic candidate ranking.
pub fn rank_candidates(
    frontier: &str,
    target: &str,
    candidates: &[CandidateBrief],
    research: Option<&Research>,
) -> String {
    let listing = candidates
        .iter()
        .map(|c| format!("- {} (confidence {}, seen together {}x)", c.name, c.best_confidence, c.co_appear_count))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "We are at {} and want to reach {}. Rank these discovered companions by how likely \
         each is to have been photographed with {}:\n{}\n{}\n\
         Schema: {{\"rankedCandidates\": [string], \"strategy\": string, \"hypothesis\": string}}",
        frontier,
        target,
        target,
        listing,
        research
            .map(|r| format!("Background: {}", r.summary))
            .unwrap_or_default(),
    )
}

/// Prompt for research-informed search queries.
pub fn smart_queries(frontier: &str, target: &str, research: Option<&Research>) -> String {
    format!(
        "Write up to 4 image search queries likely to surface photos of {} together with \
         people who could also know {}.{}\n\n\
         Schema: {{\"queries\": [string]}}",
        frontier,
        target,
        research
            .map(|r| format!(" Consider: {}", r.summary))
            .unwrap_or_default(),
    )
}

/// Prompt for generic frontier discovery queries.
pub fn frontier_queries(frontier: &str) -> String {
    format!(
        "Write up to 4 image search queries likely to surface photos of {} alongside other \
         public figures.\n\nSchema: {{\"queries\": [string]}}",
        frontier
    )
}

/// Prompt for choosing the next expansion step.
pub fn select_next_expansion(input: &ExpansionInput) -> String {
    let listing = input
        .candidates
        .iter()
        .map(|c| format!("- {} (confidence {}, seen together {}x)", c.name, c.best_confidence, c.co_appear_count))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "We are {} hops in, at {}, trying to reach {}. Remaining budget: {} searches, \
         {} recognitions, {} planner calls. Already failed: [{}].\n\
         Discovered companions:\n{}\n\n\
         Choose at most 2 candidates from the list above to verify next (exact names from the \
         list), or set stop=true when nothing is viable.\n\
         Schema: {{\"nextCandidates\": [string], \"searchQueries\": [string], \
         \"narration\": string, \"stop\": boolean, \"reason\": string}}",
        input.hop_depth,
        input.frontier,
        input.target,
        input.search_remaining,
        input.recognition_remaining,
        input.llm_remaining,
        input.failed_candidates.join(", "),
        listing,
    )
}

/// Prompt for the vision second-opinion on a candidate image.
pub fn verify_celebrities(a: &str, b: &str) -> String {
    format!(
        "Look at the attached image. Are {} and {} BOTH present, photographed together in the \
         same physical scene (not a collage or composite)?\n\n\
         Schema: {{\"personAFound\": boolean, \"personAConfidence\": number 0-100, \
         \"personBFound\": boolean, \"personBConfidence\": number 0-100, \
         \"togetherInScene\": boolean, \"overallConfidence\": number 0-100, \"notes\": string}}",
        a, b
    )
}

/// Prompt for the single-scene vision check.
pub fn single_scene() -> String {
    "Look at the attached image. Is it ONE photograph of one physical scene? Collages, \
     split frames, side-by-side composites and screenshot grids are not valid.\n\n\
     Schema: {\"valid\": boolean, \"reason\": string}"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_name_both_people() {
        let p = research_connection("Elon Musk", "Beyonce");
        assert!(p.contains("Elon Musk"));
        assert!(p.contains("Beyonce"));
    }

    #[test]
    fn test_exclusion_list_rendered() {
        let p = suggest_bridge_candidates("A", "B", &["C".to_string(), "D".to_string()]);
        assert!(p.contains("C, D"));
    }

    #[test]
    fn test_expansion_prompt_includes_budget_and_failures() {
        let input = ExpansionInput {
            frontier: "A".to_string(),
            target: "B".to_string(),
            candidates: vec![CandidateBrief {
                name: "M".to_string(),
                best_confidence: 95,
                co_appear_count: 2,
            }],
            failed_candidates: vec!["X".to_string()],
            search_remaining: 7,
            recognition_remaining: 40,
            llm_remaining: 3,
            hop_depth: 1,
        };
        let p = select_next_expansion(&input);
        assert!(p.contains("7 searches"));
        assert!(p.contains("[X]"));
        assert!(p.contains("- M (confidence 95"));
    }
}
