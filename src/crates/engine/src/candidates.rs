//! Candidate engine.
//!
//! Aggregates co-appearing detections across the analyses gathered at the
//! current frontier into ranked bridge candidates. Deduplication and
//! frontier/path exclusion run through the domain matching rules, so "Obama
//! Barack" and "Barack Obama" credit the same candidate.

use crate::verify::ImageAnalysis;
use domain::names_match;
use planner::CandidateBrief;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Aggregated co-appearance record for one potential bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub name: String,
    /// Images in which the candidate appeared beside the frontier
    pub co_appear_count: u32,
    /// Best recognition confidence seen for the candidate
    pub best_co_appear_confidence: u8,
    /// Pages the co-appearances were found on
    pub evidence_context_urls: BTreeSet<String>,
}

impl CandidateRecord {
    /// Summary form handed to the planner.
    pub fn brief(&self) -> CandidateBrief {
        CandidateBrief {
            name: self.name.clone(),
            best_confidence: self.best_co_appear_confidence,
            co_appear_count: self.co_appear_count,
        }
    }
}

/// Aggregate candidates from discovery analyses at a frontier.
///
/// For each analysis where the frontier is detected at or above the
/// threshold, every other detection at or above the threshold is credited to
/// a candidate. Anyone matching the frontier or an excluded name (people
/// already on the path) is skipped. The result is sorted by best confidence
/// then co-appearance count, both descending.
pub fn aggregate_candidates(
    frontier: &str,
    analyses: &[ImageAnalysis],
    exclude: &[String],
    threshold: u8,
) -> Vec<CandidateRecord> {
    let threshold = f32::from(threshold);
    let mut records: Vec<CandidateRecord> = Vec::new();

    for analysis in analyses {
        let frontier_present = analysis
            .detections
            .iter()
            .any(|d| d.confidence >= threshold && names_match(&d.name, frontier).is_some());
        if !frontier_present {
            continue;
        }

        for detection in &analysis.detections {
            if detection.confidence < threshold {
                continue;
            }
            if names_match(&detection.name, frontier).is_some() {
                continue;
            }
            if exclude.iter().any(|e| names_match(&detection.name, e).is_some()) {
                continue;
            }

            let confidence = detection.confidence as u8;
            match records
                .iter_mut()
                .find(|r| names_match(&r.name, &detection.name).is_some())
            {
                Some(record) => {
                    record.co_appear_count += 1;
                    record.best_co_appear_confidence =
                        record.best_co_appear_confidence.max(confidence);
                    record
                        .evidence_context_urls
                        .insert(analysis.hit.context_url.clone());
                }
                None => {
                    let mut urls = BTreeSet::new();
                    urls.insert(analysis.hit.context_url.clone());
                    records.push(CandidateRecord {
                        name: detection.name.clone(),
                        co_appear_count: 1,
                        best_co_appear_confidence: confidence,
                        evidence_context_urls: urls,
                    });
                }
            }
        }
    }

    records.sort_by(|a, b| {
        b.best_co_appear_confidence
            .cmp(&a.best_co_appear_confidence)
            .then(b.co_appear_count.cmp(&a.co_appear_count))
    });
    records
}

/// True once discovery has enough strong candidates to stop searching.
pub fn enough_candidates(records: &[CandidateRecord], min_count: usize, min_confidence: u8) -> bool {
    records
        .iter()
        .filter(|r| r.best_co_appear_confidence >= min_confidence)
        .count()
        >= min_count
}
