//! Shortest-path engine over a graph snapshot.
//!
//! Unweighted BFS over the undirected adjacency. Neighbours are expanded in
//! sorted node-id order, so the returned path is deterministic for a given
//! snapshot even when several shortest paths exist.

use crate::models::{CoAppearanceEdge, GraphSnapshot, PersonNode};
use domain::confidence::bottleneck;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// One hop of a found path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathStep {
    /// Display name of the hop's start
    pub from: String,
    /// Display name of the hop's end
    pub to: String,
    /// Edge confidence in `[0, 100]`
    pub confidence: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_url: Option<String>,
}

/// Result of a shortest-path lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathResult {
    pub found: bool,
    /// Display names along the path, endpoints included
    pub path: Vec<String>,
    /// Node ids along the path
    pub path_ids: Vec<String>,
    pub steps: Vec<PathStep>,
    pub hops: usize,
    /// Bottleneck edge confidence; 100 for the trivial same-node path
    pub min_confidence: i64,
}

impl PathResult {
    /// The not-found result.
    pub fn not_found() -> Self {
        Self {
            found: false,
            path: Vec::new(),
            path_ids: Vec::new(),
            steps: Vec::new(),
            hops: 0,
            min_confidence: 0,
        }
    }
}

/// Find the shortest path between two node ids in a snapshot.
pub fn find_path(snapshot: &GraphSnapshot, from_id: &str, to_id: &str) -> PathResult {
    let nodes: HashMap<&str, &PersonNode> =
        snapshot.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    if !nodes.contains_key(from_id) || !nodes.contains_key(to_id) {
        return PathResult::not_found();
    }

    if from_id == to_id {
        let node = nodes[from_id];
        return PathResult {
            found: true,
            path: vec![node.name.clone()],
            path_ids: vec![node.id.clone()],
            steps: Vec::new(),
            hops: 0,
            min_confidence: 100,
        };
    }

    // BTreeMap keeps neighbour expansion order sorted and deterministic.
    let mut adjacency: BTreeMap<&str, BTreeMap<&str, &CoAppearanceEdge>> = BTreeMap::new();
    for edge in &snapshot.edges {
        adjacency
            .entry(edge.source_id.as_str())
            .or_default()
            .insert(edge.target_id.as_str(), edge);
        adjacency
            .entry(edge.target_id.as_str())
            .or_default()
            .insert(edge.source_id.as_str(), edge);
    }

    let mut predecessor: HashMap<&str, &str> = HashMap::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    predecessor.insert(from_id, from_id);
    queue.push_back(from_id);

    'bfs: while let Some(current) = queue.pop_front() {
        if let Some(neighbours) = adjacency.get(current) {
            for (&next, _) in neighbours {
                if predecessor.contains_key(next) {
                    continue;
                }
                predecessor.insert(next, current);
                if next == to_id {
                    break 'bfs;
                }
                queue.push_back(next);
            }
        }
    }

    if !predecessor.contains_key(to_id) {
        return PathResult::not_found();
    }

    // Walk predecessors back from the target.
    let mut ids: Vec<&str> = vec![to_id];
    let mut cursor = to_id;
    while cursor != from_id {
        cursor = predecessor[cursor];
        ids.push(cursor);
    }
    ids.reverse();

    let mut steps = Vec::with_capacity(ids.len() - 1);
    let mut confidences = Vec::with_capacity(ids.len() - 1);
    for pair in ids.windows(2) {
        let edge = adjacency[pair[0]][pair[1]];
        confidences.push(edge.confidence.clamp(0, 100) as u8);
        steps.push(PathStep {
            from: nodes[pair[0]].name.clone(),
            to: nodes[pair[1]].name.clone(),
            confidence: edge.confidence,
            thumbnail_url: edge.best_thumbnail_url.clone(),
            context_url: edge.context_url.clone(),
        });
    }

    PathResult {
        found: true,
        path: ids.iter().map(|id| nodes[id].name.clone()).collect(),
        path_ids: ids.iter().map(|id| id.to_string()).collect(),
        hops: steps.len(),
        min_confidence: i64::from(bottleneck(&confidences)),
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, name: &str) -> PersonNode {
        PersonNode {
            id: id.to_string(),
            name: name.to_string(),
            normalised_name: name.to_lowercase(),
            first_seen_at: "2026-01-01T00:00:00Z".to_string(),
            thumbnail_url: None,
        }
    }

    fn edge(a: &str, b: &str, confidence: i64) -> CoAppearanceEdge {
        let (source, target) = if a <= b { (a, b) } else { (b, a) };
        CoAppearanceEdge {
            id: format!("{}--{}", source, target),
            source_id: source.to_string(),
            target_id: target.to_string(),
            confidence,
            best_evidence_url: None,
            best_thumbnail_url: None,
            context_url: None,
            discovered_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn chain_snapshot() -> GraphSnapshot {
        GraphSnapshot {
            nodes: vec![node("a", "A"), node("b", "B"), node("c", "C"), node("d", "D")],
            edges: vec![edge("a", "b", 95), edge("b", "c", 88), edge("c", "d", 92)],
        }
    }

    #[test]
    fn test_same_node_is_trivially_connected() {
        let result = find_path(&chain_snapshot(), "a", "a");
        assert!(result.found);
        assert_eq!(result.hops, 0);
        assert_eq!(result.min_confidence, 100);
        assert_eq!(result.path, vec!["A".to_string()]);
    }

    #[test]
    fn test_chain_path_with_bottleneck() {
        let result = find_path(&chain_snapshot(), "a", "d");
        assert!(result.found);
        assert_eq!(result.hops, 3);
        assert_eq!(result.path_ids, vec!["a", "b", "c", "d"]);
        assert_eq!(result.min_confidence, 88);
        assert_eq!(result.steps[1].from, "B");
        assert_eq!(result.steps[1].to, "C");
    }

    #[test]
    fn test_missing_node_is_not_found() {
        let result = find_path(&chain_snapshot(), "a", "zz");
        assert!(!result.found);
    }

    #[test]
    fn test_disconnected_components() {
        let mut snapshot = chain_snapshot();
        snapshot.nodes.push(node("x", "X"));
        let result = find_path(&snapshot, "a", "x");
        assert!(!result.found);
    }

    #[test]
    fn test_shortest_path_wins_over_longer() {
        let mut snapshot = chain_snapshot();
        // Direct shortcut a--d with low confidence still wins on hop count.
        snapshot.edges.push(edge("a", "d", 50));
        let result = find_path(&snapshot, "a", "d");
        assert_eq!(result.hops, 1);
        assert_eq!(result.min_confidence, 50);
    }

    #[test]
    fn test_tie_break_is_deterministic() {
        // Two 2-hop routes a->b->d and a->c->d; sorted order prefers b.
        let snapshot = GraphSnapshot {
            nodes: vec![node("a", "A"), node("b", "B"), node("c", "C"), node("d", "D")],
            edges: vec![
                edge("a", "b", 90),
                edge("b", "d", 90),
                edge("a", "c", 90),
                edge("c", "d", 90),
            ],
        };
        let result = find_path(&snapshot, "a", "d");
        assert_eq!(result.path_ids, vec!["a", "b", "d"]);
    }
}
