//! Row models for the graph store.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A person node.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PersonNode {
    /// Deterministic id derived from the normalised name
    pub id: String,
    /// Display name as first seen
    pub name: String,
    /// Normalised name (identity key)
    pub normalised_name: String,
    /// RFC 3339 timestamp of first upsert
    pub first_seen_at: String,
    /// Thumbnail image, when one has been observed
    pub thumbnail_url: Option<String>,
}

/// An undirected co-appearance edge.
///
/// `source_id` and `target_id` are stored in sorted order; `confidence` is
/// the running maximum over all evidence seen for the pair.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct CoAppearanceEdge {
    /// Canonical id: sorted node ids joined by `--`
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    /// Best image score observed, in `[0, 100]`
    pub confidence: i64,
    /// Evidence image behind the current confidence
    pub best_evidence_url: Option<String>,
    pub best_thumbnail_url: Option<String>,
    /// Page the best evidence was found on
    pub context_url: Option<String>,
    /// RFC 3339 timestamp of first acceptance
    pub discovered_at: String,
}

/// Full graph snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<PersonNode>,
    pub edges: Vec<CoAppearanceEdge>,
}

/// Summary statistics over the stored graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub node_count: i64,
    pub edge_count: i64,
    pub avg_confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_serialises_camel_case() {
        let stats = GraphStats {
            node_count: 2,
            edge_count: 1,
            avg_confidence: 88.0,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("nodeCount"));
        assert!(json.contains("avgConfidence"));
    }
}
