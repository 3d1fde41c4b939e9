//! LLM-backed planner over a chat-completions API.
//!
//! Each entry point sends one JSON-object prompt, parses the first JSON
//! block of the reply against its schema, validates it semantically, and on
//! any failure logs the cause and returns the deterministic fallback.

use crate::config::PlannerConfig;
use crate::error::{PlannerError, Result};
use crate::parse::{clamp_confidence, parse_response, validate_expansion};
use crate::{
    fallback, prompts, BridgeSuggestion, CandidateBrief, ExpansionChoice, ExpansionInput,
    ImageVerification, ParsedQuery, Planner, Research, StrategicRanking,
};
use async_trait::async_trait;
use domain::names_match;
use oracles::SceneCheck;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Planner backed by a chat-completions model.
#[derive(Clone)]
pub struct LlmPlanner {
    config: PlannerConfig,
    client: Client,
}

impl LlmPlanner {
    /// Create a new LLM planner with the given configuration.
    pub fn new(config: PlannerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(PlannerError::HttpError)?;
        Ok(Self { config, client })
    }

    /// Send one text prompt and return the raw completion.
    async fn complete(&self, user_prompt: &str) -> Result<String> {
        self.complete_with(&self.config.model, json!(user_prompt)).await
    }

    /// Send one vision prompt (text + image URL) and return the completion.
    async fn complete_vision(&self, user_prompt: &str, image_url: &str) -> Result<String> {
        let content = json!([
            {"type": "text", "text": user_prompt},
            {"type": "image_url", "image_url": {"url": image_url}},
        ]);
        self.complete_with(self.config.vision_model(), content).await
    }

    async fn complete_with(&self, model: &str, user_content: serde_json::Value) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: json!(prompts::SYSTEM),
                },
                ChatMessage {
                    role: "user",
                    content: user_content,
                },
            ],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PlannerError::Timeout("chat completion".to_string())
                } else {
                    PlannerError::HttpError(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => PlannerError::AuthenticationError(error_text),
                429 => PlannerError::RateLimitExceeded(error_text),
                _ => PlannerError::ProviderError(format!("planner error {}: {}", status, error_text)),
            });
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| PlannerError::ProviderError(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| PlannerError::ProviderError("empty choices".to_string()))
    }

    fn max_bytes(&self) -> usize {
        self.config.max_response_bytes
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    fn supports_research(&self) -> bool {
        true
    }

    async fn parse_query(&self, text: &str) -> ParsedQuery {
        let attempt: Result<ParsedQuery> = async {
            let reply = self.complete(&prompts::parse_query(text)).await?;
            let wire: WireParsedQuery = parse_response(&reply, self.max_bytes())?;
            Ok(wire.into())
        }
        .await;

        match attempt {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(error = %e, "parse_query fell back");
                fallback::parse_query(text)
            }
        }
    }

    async fn research_connection(&self, a: &str, b: &str) -> Research {
        let attempt: Result<Research> = async {
            let reply = self.complete(&prompts::research_connection(a, b)).await?;
            parse_response(&reply, self.max_bytes())
        }
        .await;

        match attempt {
            Ok(research) => research,
            Err(e) => {
                tracing::debug!(error = %e, "research_connection fell back");
                fallback::research_connection(a, b)
            }
        }
    }

    async fn suggest_bridge_candidates(
        &self,
        a: &str,
        b: &str,
        exclude: &[String],
    ) -> Vec<BridgeSuggestion> {
        let attempt: Result<Vec<BridgeSuggestion>> = async {
            let reply = self
                .complete(&prompts::suggest_bridge_candidates(a, b, exclude))
                .await?;
            let wire: WireSuggestions = parse_response(&reply, self.max_bytes())?;
            Ok(wire.candidates)
        }
        .await;

        match attempt {
            Ok(mut suggestions) => {
                suggestions.truncate(10);
                suggestions.retain(|s| {
                    !s.name.is_empty()
                        && !exclude.iter().any(|e| names_match(e, &s.name).is_some())
                });
                suggestions
            }
            Err(e) => {
                tracing::debug!(error = %e, "suggest_bridge_candidates fell back");
                Vec::new()
            }
        }
    }

    async fn rank_candidates_strategically(
        &self,
        frontier: &str,
        target: &str,
        candidates: &[CandidateBrief],
        research: Option<&Research>,
    ) -> StrategicRanking {
        let attempt: Result<StrategicRanking> = async {
            let reply = self
                .complete(&prompts::rank_candidates(frontier, target, candidates, research))
                .await?;
            let StrategicRanking {
                ranked_candidates,
                strategy,
                hypothesis,
            } = parse_response(&reply, self.max_bytes())?;
            // Only names that were actually offered survive the ranking.
            let known: Vec<String> = ranked_candidates
                .into_iter()
                .filter(|name| candidates.iter().any(|c| names_match(&c.name, name).is_some()))
                .collect();
            if known.is_empty() {
                return Err(PlannerError::ValidationFailed(
                    "ranking contained no offered candidates".to_string(),
                ));
            }
            Ok(StrategicRanking {
                ranked_candidates: known,
                strategy,
                hypothesis,
            })
        }
        .await;

        match attempt {
            Ok(ranking) => ranking,
            Err(e) => {
                tracing::debug!(error = %e, "rank_candidates fell back");
                fallback::rank_candidates(target, candidates)
            }
        }
    }

    async fn generate_smart_queries(
        &self,
        frontier: &str,
        target: &str,
        research: Option<&Research>,
    ) -> Vec<String> {
        let attempt: Result<Vec<String>> = async {
            let reply = self
                .complete(&prompts::smart_queries(frontier, target, research))
                .await?;
            let wire: WireQueries = parse_response(&reply, self.max_bytes())?;
            Ok(wire.queries)
        }
        .await;

        match attempt {
            Ok(mut queries) => {
                queries.truncate(4);
                queries.retain(|q| !q.trim().is_empty());
                if queries.is_empty() {
                    fallback::smart_queries(frontier, target)
                } else {
                    queries
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "generate_smart_queries fell back");
                fallback::smart_queries(frontier, target)
            }
        }
    }

    async fn generate_frontier_queries(&self, frontier: &str) -> Vec<String> {
        let attempt: Result<Vec<String>> = async {
            let reply = self.complete(&prompts::frontier_queries(frontier)).await?;
            let wire: WireQueries = parse_response(&reply, self.max_bytes())?;
            Ok(wire.queries)
        }
        .await;

        match attempt {
            Ok(mut queries) => {
                queries.truncate(4);
                queries.retain(|q| !q.trim().is_empty());
                if queries.is_empty() {
                    fallback::frontier_queries(frontier)
                } else {
                    queries
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "generate_frontier_queries fell back");
                fallback::frontier_queries(frontier)
            }
        }
    }

    async fn select_next_expansion(&self, input: &ExpansionInput) -> ExpansionChoice {
        let attempt: Result<ExpansionChoice> = async {
            let reply = self.complete(&prompts::select_next_expansion(input)).await?;
            let choice: ExpansionChoice = parse_response(&reply, self.max_bytes())?;
            validate_expansion(choice, &input.candidates)
        }
        .await;

        match attempt {
            Ok(choice) => choice,
            Err(e) => {
                tracing::debug!(error = %e, "select_next_expansion fell back");
                fallback::select_next_expansion(input)
            }
        }
    }

    async fn verify_celebrities_in_image(
        &self,
        image_url: &str,
        a: &str,
        b: &str,
    ) -> Option<ImageVerification> {
        let attempt: Result<ImageVerification> = async {
            let reply = self
                .complete_vision(&prompts::verify_celebrities(a, b), image_url)
                .await?;
            let wire: WireImageVerification = parse_response(&reply, self.max_bytes())?;
            Ok(wire.into())
        }
        .await;

        match attempt {
            Ok(verification) => Some(verification),
            Err(e) => {
                tracing::debug!(error = %e, "verify_celebrities_in_image fell back");
                None
            }
        }
    }

    async fn is_single_scene(&self, image_url: &str) -> SceneCheck {
        let attempt: Result<SceneCheck> = async {
            let reply = self
                .complete_vision(&prompts::single_scene(), image_url)
                .await?;
            let wire: WireSceneCheck = parse_response(&reply, self.max_bytes())?;
            Ok(SceneCheck {
                valid: wire.valid,
                reason: wire.reason,
            })
        }
        .await;

        match attempt {
            Ok(check) => check,
            Err(e) => {
                // An unreadable vision verdict must not veto the image; the
                // recognition stage still gates acceptance.
                tracing::debug!(error = %e, "is_single_scene fell back");
                SceneCheck {
                    valid: true,
                    reason: None,
                }
            }
        }
    }
}

// Chat-completions wire types
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

// Schema wire types where numbers need clamping before they become u8.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireParsedQuery {
    #[serde(default)]
    person_a: String,
    #[serde(default)]
    person_b: String,
    #[serde(default)]
    is_valid: bool,
    #[serde(default)]
    confidence: i64,
    reason: Option<String>,
}

impl From<WireParsedQuery> for ParsedQuery {
    fn from(w: WireParsedQuery) -> Self {
        let is_valid = w.is_valid && !w.person_a.is_empty() && !w.person_b.is_empty();
        ParsedQuery {
            person_a: w.person_a,
            person_b: w.person_b,
            is_valid,
            confidence: clamp_confidence(w.confidence),
            reason: w.reason,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSuggestions {
    #[serde(default)]
    candidates: Vec<BridgeSuggestion>,
}

#[derive(Debug, Deserialize)]
struct WireQueries {
    #[serde(default)]
    queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireImageVerification {
    #[serde(default)]
    person_a_found: bool,
    #[serde(default)]
    person_a_confidence: i64,
    #[serde(default)]
    person_b_found: bool,
    #[serde(default)]
    person_b_confidence: i64,
    #[serde(default)]
    together_in_scene: bool,
    #[serde(default)]
    overall_confidence: i64,
    #[serde(default)]
    notes: String,
}

impl From<WireImageVerification> for ImageVerification {
    fn from(w: WireImageVerification) -> Self {
        ImageVerification {
            person_a_found: w.person_a_found,
            person_a_confidence: clamp_confidence(w.person_a_confidence),
            person_b_found: w.person_b_found,
            person_b_confidence: clamp_confidence(w.person_b_confidence),
            together_in_scene: w.together_in_scene,
            overall_confidence: clamp_confidence(w.overall_confidence),
            notes: w.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSceneCheck {
    #[serde(default)]
    valid: bool,
    reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planner_creation() {
        let config = PlannerConfig::new("key", "https://api.example.com/v1", "model");
        let planner = LlmPlanner::new(config).unwrap();
        assert!(planner.supports_research());
    }

    #[test]
    fn test_wire_parsed_query_clamps_and_validates() {
        let wire = WireParsedQuery {
            person_a: "A".to_string(),
            person_b: String::new(),
            is_valid: true,
            confidence: 250,
            reason: None,
        };
        let parsed: ParsedQuery = wire.into();
        // Missing second name invalidates the parse regardless of the flag.
        assert!(!parsed.is_valid);
        assert_eq!(parsed.confidence, 100);
    }

    #[test]
    fn test_wire_image_verification_clamps() {
        let wire: WireImageVerification = serde_json::from_str(
            r#"{"personAFound": true, "personAConfidence": 120,
                "personBFound": true, "personBConfidence": -3,
                "togetherInScene": true, "overallConfidence": 90}"#,
        )
        .unwrap();
        let v: ImageVerification = wire.into();
        assert_eq!(v.person_a_confidence, 100);
        assert_eq!(v.person_b_confidence, 0);
    }
}
