//! Verification pipeline.
//!
//! For each candidate image: fetch bytes, gate through the vision scene
//! filter, run face recognition, and score the result. Oracle calls over the
//! images of one query run with a bounded fan-out; budget decrements stay
//! atomic so the fan-out can never overshoot a tier. Per-image failures
//! degrade to `image_result` error events and the loop continues.

use crate::budget::{BudgetTier, Budgets};
use crate::bus::RunLog;
use crate::config::EngineConfig;
use crate::events::{EventData, EventType, ImageStatus};
use domain::names_match;
use futures::stream::{self, StreamExt};
use oracles::{FaceDetection, FaceRecognizer, ImageFetcher, ImageHit, ImageSearch, VisionFilter};
use planner::Planner;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One accepted evidence image for an edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceImage {
    pub image_url: String,
    pub thumbnail_url: String,
    pub context_url: String,
    /// `min` of the two recognition confidences
    pub score: u8,
}

/// A verified co-appearance between two people.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedEdge {
    pub a: String,
    pub b: String,
    /// `max` image score over the evidence set
    pub confidence: u8,
    pub evidence: Vec<EvidenceImage>,
    /// The evidence image that achieved `confidence`
    pub best: EvidenceImage,
}

/// A single-scene image with its recognised faces, used for candidate
/// aggregation at the frontier.
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    pub hit: ImageHit,
    pub detections: Vec<FaceDetection>,
}

/// Raw per-image oracle outcome before scoring.
struct AnalyzedImage {
    hit: ImageHit,
    scene_valid: bool,
    scene_reason: Option<String>,
    detections: Vec<FaceDetection>,
    error: Option<String>,
}

/// Composes the oracles over candidate images under the run budgets.
pub struct VerificationPipeline {
    search: Arc<dyn ImageSearch>,
    recognizer: Arc<dyn FaceRecognizer>,
    vision: Arc<dyn VisionFilter>,
    planner: Arc<dyn Planner>,
    fetcher: Option<ImageFetcher>,
    budgets: Arc<Budgets>,
    config: EngineConfig,
}

impl VerificationPipeline {
    /// Create a pipeline over the given oracles and budgets.
    pub fn new(
        search: Arc<dyn ImageSearch>,
        recognizer: Arc<dyn FaceRecognizer>,
        vision: Arc<dyn VisionFilter>,
        planner: Arc<dyn Planner>,
        budgets: Arc<Budgets>,
        config: EngineConfig,
    ) -> Self {
        Self {
            search,
            recognizer,
            vision,
            planner,
            fetcher: None,
            budgets,
            config,
        }
    }

    /// Enable byte-level fetch validation of every image before analysis.
    pub fn with_fetcher(mut self, fetcher: ImageFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// The budgets this pipeline decrements.
    pub fn budgets(&self) -> &Arc<Budgets> {
        &self.budgets
    }

    /// Run one search query under the search budget.
    ///
    /// Returns `None` when the budget is exhausted; a provider failure is
    /// reported on the log and yields an empty batch.
    pub async fn search_images(&self, log: &RunLog, query: &str) -> Option<Vec<ImageHit>> {
        if !self.budgets.try_consume(BudgetTier::Search) {
            return None;
        }
        match self.search.search(query).await {
            Ok(mut hits) => {
                hits.truncate(self.config.images_per_query);
                Some(hits)
            }
            Err(e) => {
                tracing::warn!(query, error = %e, "image search failed");
                log.append(
                    EventType::Status,
                    format!("Search failed for {:?}: {}", query, e),
                    EventData::new().with_reason(e.to_string()),
                );
                Some(Vec::new())
            }
        }
    }

    /// Analyse the images behind one discovery query and return the usable
    /// single-scene analyses. Emits one `image_result` per image.
    pub async fn discover_query(&self, log: &RunLog, query: &str) -> Option<Vec<ImageAnalysis>> {
        let hits = self.search_images(log, query).await?;
        let total = hits.len() as u32;
        let analyzed = self.analyze_batch(hits).await;

        let mut usable = Vec::new();
        for (index, image) in analyzed.into_iter().enumerate() {
            let (status, reason) = match (&image.error, image.scene_valid) {
                (Some(e), _) => (ImageStatus::Error, Some(e.clone())),
                (None, false) => (ImageStatus::Collage, image.scene_reason.clone()),
                (None, true) => (ImageStatus::NoMatch, None),
            };
            let mut data = EventData::new()
                .with_image(image.hit.image_url.clone(), status)
                .with_budget(self.budgets.snapshot());
            data.query = Some(query.to_string());
            data.image_index = Some(index as u32);
            data.total_images = Some(total);
            if !image.detections.is_empty() {
                data.celebrities = Some(image.detections.clone());
            }
            data.reason = reason;
            log.append(
                EventType::ImageResult,
                format!("Analysed image {}/{}", index + 1, total),
                data,
            );

            if image.error.is_none() && image.scene_valid {
                usable.push(ImageAnalysis {
                    hit: image.hit,
                    detections: image.detections,
                });
            }
        }
        Some(usable)
    }

    /// Try to verify that `a` and `b` are visually co-present.
    ///
    /// Generates up to `verification_queries` queries, analyses each batch,
    /// and accumulates evidence until `max_evidence_images` images are
    /// accepted or the budgets run out.
    pub async fn verify_edge(&self, log: &RunLog, a: &str, b: &str) -> Option<VerifiedEdge> {
        let queries = [format!("{} {}", a, b), format!("{} {} photo", a, b)];
        let mut evidence: Vec<EvidenceImage> = Vec::new();
        let mut seen = std::collections::HashSet::new();

        'queries: for query in queries.iter().take(self.config.verification_queries) {
            let Some(mut hits) = self.search_images(log, query).await else {
                break;
            };
            // Queries overlap heavily; never analyse the same URL twice.
            hits.retain(|h| seen.insert(h.image_url.clone()));
            let total = hits.len() as u32;
            let analyzed = self.analyze_batch(hits).await;

            for (index, image) in analyzed.into_iter().enumerate() {
                let outcome = self.score_image(&image, a, b).await;
                let mut data = EventData::new()
                    .with_pair(a, b)
                    .with_image(image.hit.image_url.clone(), outcome.status)
                    .with_budget(self.budgets.snapshot());
                data.query = Some(query.to_string());
                data.image_index = Some(index as u32);
                data.total_images = Some(total);
                if !image.detections.is_empty() {
                    data.celebrities = Some(image.detections.clone());
                }
                data.reason = outcome.reason;
                log.append(
                    EventType::ImageResult,
                    format!("Analysed image {}/{}", index + 1, total),
                    data,
                );

                if let Some(score) = outcome.score {
                    evidence.push(EvidenceImage {
                        image_url: image.hit.image_url.clone(),
                        thumbnail_url: image.hit.thumbnail_url.clone(),
                        context_url: image.hit.context_url.clone(),
                        score,
                    });
                    if evidence.len() >= self.config.max_evidence_images {
                        break 'queries;
                    }
                }
            }
        }

        let best = evidence.iter().max_by_key(|e| e.score)?.clone();
        Some(VerifiedEdge {
            a: a.to_string(),
            b: b.to_string(),
            confidence: best.score,
            evidence,
            best,
        })
    }

    /// Analyse a batch of images with bounded concurrency.
    async fn analyze_batch(&self, hits: Vec<ImageHit>) -> Vec<AnalyzedImage> {
        stream::iter(hits)
            .map(|hit| self.analyze_image(hit))
            .buffered(self.config.fan_out.max(1))
            .collect()
            .await
    }

    /// Run fetch, scene filter, and recognition over one image.
    async fn analyze_image(&self, hit: ImageHit) -> AnalyzedImage {
        let mut analyzed = AnalyzedImage {
            hit,
            scene_valid: true,
            scene_reason: None,
            detections: Vec::new(),
            error: None,
        };

        if let Some(ref fetcher) = self.fetcher {
            if let Err(e) = fetcher.fetch(&analyzed.hit.image_url).await {
                analyzed.error = Some(e.to_string());
                return analyzed;
            }
        }

        // The scene filter is a vision LLM call; once that tier is spent the
        // filter is skipped and recognition alone gates acceptance.
        if self.budgets.try_consume(BudgetTier::Llm) {
            match self.vision.is_single_scene(&analyzed.hit.image_url).await {
                Ok(check) if !check.valid => {
                    analyzed.scene_valid = false;
                    analyzed.scene_reason = check.reason;
                    return analyzed;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "scene filter failed, continuing");
                }
            }
        }

        if !self.budgets.try_consume(BudgetTier::Recognition) {
            analyzed.error = Some("recognition budget exhausted".to_string());
            return analyzed;
        }
        match self.recognizer.recognize(&analyzed.hit.image_url).await {
            Ok(detections) => analyzed.detections = detections,
            Err(e) => analyzed.error = Some(e.to_string()),
        }

        analyzed
    }

    /// Decide the status and score of an analysed image for a target pair.
    async fn score_image(&self, image: &AnalyzedImage, a: &str, b: &str) -> ScoredImage {
        if let Some(ref error) = image.error {
            return ScoredImage {
                status: ImageStatus::Error,
                score: None,
                reason: Some(error.clone()),
            };
        }
        if !image.scene_valid {
            return ScoredImage {
                status: ImageStatus::Collage,
                score: None,
                reason: image.scene_reason.clone(),
            };
        }

        let threshold = f32::from(self.config.confidence_threshold);
        let conf_a = match_target(&image.detections, a, threshold);
        let conf_b = match_target(&image.detections, b, threshold);

        if let (Some(ca), Some(cb)) = (conf_a, conf_b) {
            return ScoredImage {
                status: ImageStatus::Evidence,
                score: Some(ca.min(cb) as u8),
                reason: None,
            };
        }

        // One party unidentified: ask the planner for a vision second
        // opinion before giving up on the image.
        if (conf_a.is_some() || conf_b.is_some()) && self.budgets.try_consume(BudgetTier::Llm) {
            if let Some(v) = self
                .planner
                .verify_celebrities_in_image(&image.hit.image_url, a, b)
                .await
            {
                let ca = f32::from(v.person_a_confidence);
                let cb = f32::from(v.person_b_confidence);
                if v.person_a_found
                    && v.person_b_found
                    && v.together_in_scene
                    && ca >= threshold
                    && cb >= threshold
                {
                    return ScoredImage {
                        status: ImageStatus::Evidence,
                        score: Some(ca.min(cb) as u8),
                        reason: Some("confirmed by vision model".to_string()),
                    };
                }
            }
        }

        ScoredImage {
            status: ImageStatus::NoMatch,
            score: None,
            reason: None,
        }
    }
}

struct ScoredImage {
    status: ImageStatus,
    score: Option<u8>,
    reason: Option<String>,
}

/// Find a detection naming `target` at or above the threshold.
fn match_target(detections: &[FaceDetection], target: &str, threshold: f32) -> Option<f32> {
    detections
        .iter()
        .filter(|d| d.confidence >= threshold && names_match(&d.name, target).is_some())
        .map(|d| d.confidence)
        .fold(None, |best, c| Some(best.map_or(c, |b: f32| b.max(c))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracles::scripted::{face, hit, ScriptedFaceRecognizer, ScriptedImageSearch, ScriptedVisionFilter};
    use planner::BasicPlanner;

    fn pipeline(
        search: ScriptedImageSearch,
        recognizer: ScriptedFaceRecognizer,
        vision: ScriptedVisionFilter,
        config: EngineConfig,
    ) -> VerificationPipeline {
        let budgets = Arc::new(Budgets::new(
            config.search_budget,
            config.recognition_budget,
            config.llm_budget,
        ));
        VerificationPipeline::new(
            Arc::new(search),
            Arc::new(recognizer),
            Arc::new(vision),
            Arc::new(BasicPlanner::new()),
            budgets,
            config,
        )
    }

    #[tokio::test]
    async fn test_verify_edge_accepts_at_threshold() {
        let search = ScriptedImageSearch::new()
            .on("Alpha One Beta Two", vec![hit("https://img/ab.jpg", "https://page/ab")]);
        let recognizer = ScriptedFaceRecognizer::new()
            .on("ab.jpg", vec![face("Alpha One", 80.0), face("Beta Two", 91.0)]);
        let pipeline = pipeline(
            search,
            recognizer,
            ScriptedVisionFilter::accepting_all(),
            EngineConfig::default(),
        );

        let log = RunLog::new("run-1");
        let edge = pipeline
            .verify_edge(&log, "Alpha One", "Beta Two")
            .await
            .expect("edge verified");
        assert_eq!(edge.confidence, 80);
        assert_eq!(edge.best.image_url, "https://img/ab.jpg");
        assert!(log
            .events_from(0)
            .iter()
            .any(|e| e.data.status == Some(ImageStatus::Evidence)));
    }

    #[tokio::test]
    async fn test_verify_edge_rejects_below_threshold() {
        let search = ScriptedImageSearch::new()
            .on("Alpha One Beta Two", vec![hit("https://img/ab.jpg", "https://page/ab")]);
        let recognizer = ScriptedFaceRecognizer::new()
            .on("ab.jpg", vec![face("Alpha One", 79.0), face("Beta Two", 95.0)]);
        let pipeline = pipeline(
            search,
            recognizer,
            ScriptedVisionFilter::accepting_all(),
            EngineConfig::default(),
        );

        let log = RunLog::new("run-1");
        assert!(pipeline.verify_edge(&log, "Alpha One", "Beta Two").await.is_none());
        assert!(log
            .events_from(0)
            .iter()
            .any(|e| e.data.status == Some(ImageStatus::NoMatch)));
    }

    #[tokio::test]
    async fn test_collage_images_are_rejected() {
        let search = ScriptedImageSearch::new()
            .on("Alpha One Beta Two", vec![hit("https://img/ab.jpg", "https://page/ab")]);
        let recognizer = ScriptedFaceRecognizer::new()
            .on("ab.jpg", vec![face("Alpha One", 95.0), face("Beta Two", 95.0)]);
        let pipeline = pipeline(
            search,
            recognizer,
            ScriptedVisionFilter::rejecting_all(),
            EngineConfig::default(),
        );

        let log = RunLog::new("run-1");
        assert!(pipeline.verify_edge(&log, "Alpha One", "Beta Two").await.is_none());
        let events = log.events_from(0);
        assert!(events.iter().any(|e| e.data.status == Some(ImageStatus::Collage)));
        assert!(!events.iter().any(|e| e.data.status == Some(ImageStatus::Evidence)));
    }

    #[tokio::test]
    async fn test_recognizer_failure_degrades_to_error_event() {
        let search = ScriptedImageSearch::new()
            .on("Alpha One Beta Two", vec![hit("https://img/ab.jpg", "https://page/ab")]);
        let recognizer = ScriptedFaceRecognizer::new().failing_on("ab.jpg", "provider down");
        let pipeline = pipeline(
            search,
            recognizer,
            ScriptedVisionFilter::accepting_all(),
            EngineConfig::default(),
        );

        let log = RunLog::new("run-1");
        assert!(pipeline.verify_edge(&log, "Alpha One", "Beta Two").await.is_none());
        assert!(log
            .events_from(0)
            .iter()
            .any(|e| e.data.status == Some(ImageStatus::Error)));
    }

    #[tokio::test]
    async fn test_zero_search_budget_means_zero_searches() {
        let search = ScriptedImageSearch::new()
            .on("Alpha One Beta Two", vec![hit("https://img/ab.jpg", "https://page/ab")]);
        let config = EngineConfig::default().with_budgets(0, 100, 15);
        let pipeline = pipeline(
            search,
            ScriptedFaceRecognizer::new(),
            ScriptedVisionFilter::accepting_all(),
            config,
        );

        let log = RunLog::new("run-1");
        assert!(pipeline.verify_edge(&log, "Alpha One", "Beta Two").await.is_none());
        // The scripted search was never reached.
        let search_calls = Arc::clone(pipeline.budgets());
        assert_eq!(search_calls.snapshot().search_used, 0);
    }

    #[tokio::test]
    async fn test_best_evidence_wins() {
        let search = ScriptedImageSearch::new().on(
            "Alpha One Beta Two",
            vec![
                hit("https://img/ok.jpg", "https://page/1"),
                hit("https://img/better.jpg", "https://page/2"),
            ],
        );
        let recognizer = ScriptedFaceRecognizer::new()
            .on("ok.jpg", vec![face("Alpha One", 82.0), face("Beta Two", 85.0)])
            .on("better.jpg", vec![face("Alpha One", 97.0), face("Beta Two", 93.0)]);
        let pipeline = pipeline(
            search,
            recognizer,
            ScriptedVisionFilter::accepting_all(),
            EngineConfig::default(),
        );

        let log = RunLog::new("run-1");
        let edge = pipeline
            .verify_edge(&log, "Alpha One", "Beta Two")
            .await
            .expect("edge verified");
        assert_eq!(edge.confidence, 93);
        assert_eq!(edge.best.image_url, "https://img/better.jpg");
        assert_eq!(edge.evidence.len(), 2);
    }

    #[tokio::test]
    async fn test_discover_query_keeps_single_scenes_only() {
        let search = ScriptedImageSearch::new().on(
            "Alpha One photo",
            vec![
                hit("https://img/solo.jpg", "https://page/1"),
                hit("https://img/collage.jpg", "https://page/2"),
            ],
        );
        let recognizer = ScriptedFaceRecognizer::new()
            .on("solo.jpg", vec![face("Alpha One", 92.0), face("Gamma Three", 90.0)]);
        let vision =
            ScriptedVisionFilter::accepting_all().rejecting("collage.jpg", "split frame");
        let pipeline = pipeline(search, recognizer, vision, EngineConfig::default());

        let log = RunLog::new("run-1");
        let analyses = pipeline
            .discover_query(&log, "Alpha One photo")
            .await
            .expect("budget available");
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].hit.image_url, "https://img/solo.jpg");
        assert_eq!(analyses[0].detections.len(), 2);
    }

    #[test]
    fn test_match_target_uses_matching_rules() {
        let detections = vec![face("Obama Barack", 91.0), face("Someone Else", 99.0)];
        assert_eq!(match_target(&detections, "Barack Obama", 80.0), Some(91.0));
        assert_eq!(match_target(&detections, "Barack Obama", 95.0), None);
        assert_eq!(match_target(&detections, "Nobody", 50.0), None);
    }
}
