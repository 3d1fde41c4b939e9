//! Graph read endpoints and the global edge-update WebSocket.

use crate::api::error::{ApiError, ApiResult};
use crate::api::routes::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
    Json,
};
use engine::GraphBroadcaster;
use graphstore::{GraphStats, PathResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::broadcast;

/// How often the graph WebSocket sends a keepalive ping.
const WS_PING_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNodeView {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdgeView {
    pub id: String,
    pub source: String,
    pub target: String,
    pub confidence: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GraphView {
    pub nodes: Vec<GraphNodeView>,
    pub edges: Vec<GraphEdgeView>,
}

/// GET /graph
pub async fn graph_snapshot(State(state): State<AppState>) -> ApiResult<Json<GraphView>> {
    let snapshot = state.store.get_full_graph().await?;
    Ok(Json(GraphView {
        nodes: snapshot
            .nodes
            .into_iter()
            .map(|n| GraphNodeView {
                id: n.id,
                name: n.name,
                thumbnail_url: n.thumbnail_url,
            })
            .collect(),
        edges: snapshot
            .edges
            .into_iter()
            .map(|e| GraphEdgeView {
                id: e.id,
                source: e.source_id,
                target: e.target_id,
                confidence: e.confidence,
                thumbnail_url: e.best_thumbnail_url,
                context_url: e.context_url,
                evidence_url: e.best_evidence_url,
            })
            .collect(),
    }))
}

/// GET /graph/stats
pub async fn graph_stats(State(state): State<AppState>) -> ApiResult<Json<GraphStats>> {
    Ok(Json(state.store.stats().await?))
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// GET /graph/path?from=…&to=…
pub async fn graph_path(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Json<PathResult>> {
    let from = query
        .from
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("from is required".to_string()))?;
    let to = query
        .to
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("to is required".to_string()))?;
    Ok(Json(state.store.find_path(&from, &to).await?))
}

/// GET /graph/ws
pub async fn graph_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let broadcaster = state.broadcaster.clone();
    let timeout = state.stream_timeout;
    ws.on_upgrade(move |socket| handle_graph_socket(socket, broadcaster, timeout))
        .into_response()
}

async fn handle_graph_socket(
    mut socket: WebSocket,
    broadcaster: GraphBroadcaster,
    timeout: Duration,
) {
    let mut updates = broadcaster.subscribe();
    let mut ping = tokio::time::interval(WS_PING_INTERVAL);
    ping.tick().await; // first tick fires immediately
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => {
                    let msg = json!({"type": "edge_update", "data": update}).to_string();
                    if socket.send(Message::Text(msg)).await.is_err() {
                        return;
                    }
                }
                // Dropped pushes are fine; the client refetches /graph.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if text.contains("ping") {
                        let pong = json!({"type": "pong"}).to_string();
                        if socket.send(Message::Text(pong)).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => return,
                Some(Ok(_)) => {}
                Some(Err(_)) => return,
            },
            _ = ping.tick() => {
                let msg = json!({"type": "ping"}).to_string();
                if socket.send(Message::Text(msg)).await.is_err() {
                    return;
                }
            }
            _ = &mut deadline => break,
        }
    }

    let _ = socket.send(Message::Close(None)).await;
}
