//! Graph store operations.
//!
//! Upserts are idempotent and safe under concurrent writers: node identity
//! is deterministic, edge rows live under the canonical sorted pair, and the
//! confidence/best-evidence update is a single conditional statement so two
//! racing observations can only ever leave the higher confidence behind.

use crate::connection::GraphDatabase;
use crate::error::{GraphStoreError, Result};
use crate::models::{CoAppearanceEdge, GraphSnapshot, GraphStats, PersonNode};
use crate::path::{self, PathResult};
use chrono::Utc;
use domain::{node_id, normalise_name};

/// Evidence attached to an edge observation.
#[derive(Debug, Clone, Default)]
pub struct EdgeEvidence {
    pub best_evidence_url: Option<String>,
    pub best_thumbnail_url: Option<String>,
    pub context_url: Option<String>,
}

/// Persistent co-appearance graph.
#[derive(Clone)]
pub struct GraphStore {
    db: GraphDatabase,
}

impl GraphStore {
    /// Create a store over an existing database connection.
    pub fn new(db: GraphDatabase) -> Self {
        Self { db }
    }

    /// The underlying database handle.
    pub fn database(&self) -> &GraphDatabase {
        &self.db
    }

    /// Insert a person or return the existing node.
    ///
    /// A stored NULL thumbnail is filled when `thumbnail_url` is provided;
    /// an existing thumbnail is kept.
    pub async fn upsert_node(&self, name: &str, thumbnail_url: Option<&str>) -> Result<PersonNode> {
        let normalised = normalise_name(name);
        if normalised.is_empty() {
            return Err(GraphStoreError::InvalidPair(format!(
                "name {:?} normalises to nothing",
                name
            )));
        }
        let id = node_id(name);
        let now = Utc::now().to_rfc3339();

        let node = sqlx::query_as::<_, PersonNode>(
            "INSERT INTO persons (id, name, normalised_name, first_seen_at, thumbnail_url)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE
                SET thumbnail_url = COALESCE(persons.thumbnail_url, excluded.thumbnail_url)
             RETURNING *",
        )
        .bind(&id)
        .bind(name.trim())
        .bind(&normalised)
        .bind(&now)
        .bind(thumbnail_url)
        .fetch_one(self.db.pool())
        .await?;

        Ok(node)
    }

    /// Record a verified co-appearance between `a` and `b`.
    ///
    /// Creates both nodes on demand. On conflict the stored confidence
    /// becomes the max of old and new; the best-evidence triple is replaced
    /// only when the new confidence strictly exceeds the old.
    pub async fn upsert_edge(
        &self,
        a: &str,
        b: &str,
        confidence: u8,
        evidence: EdgeEvidence,
    ) -> Result<CoAppearanceEdge> {
        let (ida, idb) = (node_id(a), node_id(b));
        if ida == idb {
            return Err(GraphStoreError::InvalidPair(format!(
                "{:?} and {:?} resolve to the same person",
                a, b
            )));
        }

        self.upsert_node(a, evidence.best_thumbnail_url.as_deref()).await?;
        self.upsert_node(b, evidence.best_thumbnail_url.as_deref()).await?;

        let (source_id, target_id) = if ida < idb { (ida, idb) } else { (idb, ida) };
        let edge_id = format!("{}--{}", source_id, target_id);
        let now = Utc::now().to_rfc3339();
        let confidence = i64::from(confidence.min(100));

        let edge = sqlx::query_as::<_, CoAppearanceEdge>(
            "INSERT INTO co_appearances
                (id, source_id, target_id, confidence,
                 best_evidence_url, best_thumbnail_url, context_url, discovered_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                best_evidence_url = CASE
                    WHEN excluded.confidence > co_appearances.confidence
                    THEN excluded.best_evidence_url ELSE co_appearances.best_evidence_url END,
                best_thumbnail_url = CASE
                    WHEN excluded.confidence > co_appearances.confidence
                    THEN excluded.best_thumbnail_url ELSE co_appearances.best_thumbnail_url END,
                context_url = CASE
                    WHEN excluded.confidence > co_appearances.confidence
                    THEN excluded.context_url ELSE co_appearances.context_url END,
                confidence = MAX(co_appearances.confidence, excluded.confidence)
             RETURNING *",
        )
        .bind(&edge_id)
        .bind(&source_id)
        .bind(&target_id)
        .bind(confidence)
        .bind(&evidence.best_evidence_url)
        .bind(&evidence.best_thumbnail_url)
        .bind(&evidence.context_url)
        .bind(&now)
        .fetch_one(self.db.pool())
        .await?;

        tracing::debug!(edge = %edge.id, confidence = edge.confidence, "edge upserted");
        Ok(edge)
    }

    /// Look up a person by display name.
    pub async fn get_node(&self, name: &str) -> Result<Option<PersonNode>> {
        let node = sqlx::query_as::<_, PersonNode>("SELECT * FROM persons WHERE id = ?")
            .bind(node_id(name))
            .fetch_optional(self.db.pool())
            .await?;
        Ok(node)
    }

    /// Read the full graph.
    pub async fn get_full_graph(&self) -> Result<GraphSnapshot> {
        let nodes = sqlx::query_as::<_, PersonNode>("SELECT * FROM persons ORDER BY id")
            .fetch_all(self.db.pool())
            .await?;
        let edges = sqlx::query_as::<_, CoAppearanceEdge>("SELECT * FROM co_appearances ORDER BY id")
            .fetch_all(self.db.pool())
            .await?;
        Ok(GraphSnapshot { nodes, edges })
    }

    /// Summary statistics.
    pub async fn stats(&self) -> Result<GraphStats> {
        let (node_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM persons")
            .fetch_one(self.db.pool())
            .await?;
        let (edge_count, avg_confidence): (i64, Option<f64>) =
            sqlx::query_as("SELECT COUNT(*), AVG(confidence) FROM co_appearances")
                .fetch_one(self.db.pool())
                .await?;
        Ok(GraphStats {
            node_count,
            edge_count,
            avg_confidence: avg_confidence.unwrap_or(0.0),
        })
    }

    /// Shortest path between two display names over the current snapshot.
    pub async fn find_path(&self, from: &str, to: &str) -> Result<PathResult> {
        let snapshot = self.get_full_graph().await?;
        Ok(path::find_path(&snapshot, &node_id(from), &node_id(to)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> GraphStore {
        GraphStore::new(GraphDatabase::in_memory().await.unwrap())
    }

    fn evidence(url: &str) -> EdgeEvidence {
        EdgeEvidence {
            best_evidence_url: Some(url.to_string()),
            best_thumbnail_url: Some(format!("{}?thumb=1", url)),
            context_url: Some("https://page.example/ctx".to_string()),
        }
    }

    #[tokio::test]
    async fn test_upsert_node_is_idempotent() {
        let store = store().await;
        let first = store.upsert_node("Barack Obama", None).await.unwrap();
        let second = store.upsert_node("barack  OBAMA", None).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.name, "Barack Obama");

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.node_count, 1);
    }

    #[tokio::test]
    async fn test_node_thumbnail_fills_null_only() {
        let store = store().await;
        store.upsert_node("A Person", None).await.unwrap();
        let filled = store
            .upsert_node("A Person", Some("https://img/1.jpg"))
            .await
            .unwrap();
        assert_eq!(filled.thumbnail_url.as_deref(), Some("https://img/1.jpg"));

        let kept = store
            .upsert_node("A Person", Some("https://img/2.jpg"))
            .await
            .unwrap();
        assert_eq!(kept.thumbnail_url.as_deref(), Some("https://img/1.jpg"));
    }

    #[tokio::test]
    async fn test_upsert_edge_creates_nodes_on_demand() {
        let store = store().await;
        let edge = store
            .upsert_edge("Elon Musk", "Beyonce", 92, evidence("https://img/e.jpg"))
            .await
            .unwrap();
        assert_eq!(edge.confidence, 92);
        assert_eq!(edge.id, "beyonce--elon-musk");

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.edge_count, 1);
    }

    #[tokio::test]
    async fn test_edge_is_order_independent() {
        let store = store().await;
        let ab = store
            .upsert_edge("Elon Musk", "Beyonce", 80, EdgeEvidence::default())
            .await
            .unwrap();
        let ba = store
            .upsert_edge("Beyonce", "Elon Musk", 70, EdgeEvidence::default())
            .await
            .unwrap();
        assert_eq!(ab.id, ba.id);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.edge_count, 1);
    }

    #[tokio::test]
    async fn test_edge_confidence_is_running_max() {
        let store = store().await;
        store
            .upsert_edge("A One", "B Two", 85, evidence("https://img/first.jpg"))
            .await
            .unwrap();

        // Lower confidence keeps the old evidence triple.
        let lower = store
            .upsert_edge("A One", "B Two", 60, evidence("https://img/worse.jpg"))
            .await
            .unwrap();
        assert_eq!(lower.confidence, 85);
        assert_eq!(
            lower.best_evidence_url.as_deref(),
            Some("https://img/first.jpg")
        );

        // Strictly higher confidence replaces it.
        let higher = store
            .upsert_edge("A One", "B Two", 93, evidence("https://img/better.jpg"))
            .await
            .unwrap();
        assert_eq!(higher.confidence, 93);
        assert_eq!(
            higher.best_evidence_url.as_deref(),
            Some("https://img/better.jpg")
        );

        // Equal confidence does not replace.
        let equal = store
            .upsert_edge("A One", "B Two", 93, evidence("https://img/same.jpg"))
            .await
            .unwrap();
        assert_eq!(
            equal.best_evidence_url.as_deref(),
            Some("https://img/better.jpg")
        );
    }

    #[tokio::test]
    async fn test_repeated_identical_upsert_leaves_graph_unchanged() {
        let store = store().await;
        let first = store
            .upsert_edge("A One", "B Two", 77, evidence("https://img/x.jpg"))
            .await
            .unwrap();
        let second = store
            .upsert_edge("A One", "B Two", 77, evidence("https://img/x.jpg"))
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_self_loop_rejected() {
        let store = store().await;
        let same = store
            .upsert_edge("Barack Obama", "barack  OBAMA", 90, EdgeEvidence::default())
            .await
            .unwrap_err();
        assert!(matches!(same, GraphStoreError::InvalidPair(_)));
    }

    #[tokio::test]
    async fn test_find_path_same_node() {
        let store = store().await;
        store.upsert_node("Solo Person", None).await.unwrap();
        let result = store.find_path("Solo Person", "solo person").await.unwrap();
        assert!(result.found);
        assert_eq!(result.hops, 0);
        assert_eq!(result.min_confidence, 100);
    }

    #[tokio::test]
    async fn test_find_path_two_hops() {
        let store = store().await;
        store
            .upsert_edge("A One", "M Bridge", 95, EdgeEvidence::default())
            .await
            .unwrap();
        store
            .upsert_edge("M Bridge", "B Two", 88, EdgeEvidence::default())
            .await
            .unwrap();

        let result = store.find_path("A One", "B Two").await.unwrap();
        assert!(result.found);
        assert_eq!(result.hops, 2);
        assert_eq!(result.min_confidence, 88);
        assert_eq!(
            result.path,
            vec!["A One".to_string(), "M Bridge".to_string(), "B Two".to_string()]
        );
    }

    #[tokio::test]
    async fn test_find_path_missing_person() {
        let store = store().await;
        let result = store.find_path("Nobody Here", "Also Nobody").await.unwrap();
        assert!(!result.found);
    }
}
