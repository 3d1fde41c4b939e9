//! Per-run event streaming: SSE and WebSocket with cursor replay.
//!
//! Both transports obey the same contract: replay every event with
//! `index >= cursor` in order, then the live tail, then a `complete`
//! sentinel once the run has reached a terminal event. A receiver that lags
//! the broadcast channel resyncs from the log by cursor, so no subscriber
//! ever observes a gap.

use crate::api::error::ApiError;
use crate::api::handlers::chat::CursorQuery;
use crate::api::routes::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use engine::{RunEvent, RunHandle};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// How often the WebSocket side sends a keepalive ping.
const WS_PING_INTERVAL: Duration = Duration::from_secs(30);

/// GET /chat/stream/:run_id
pub async fn run_sse(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Query(query): Query<CursorQuery>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let run = state
        .registry
        .get(&run_id)
        .ok_or_else(|| ApiError::NotFound(format!("run {}", run_id)))?;
    let timeout = state.stream_timeout;
    let cursor = query.cursor;

    let stream = async_stream::stream! {
        let started = Instant::now();
        let (replay, mut live) = run.log.subscribe_from(cursor);
        let mut next_cursor = cursor;
        let mut terminal_seen = false;

        for event in replay {
            next_cursor = event.index + 1;
            terminal_seen = event.event_type.is_terminal();
            yield Ok(sse_event(&event));
        }

        while !terminal_seen && started.elapsed() < timeout {
            let remaining = timeout.saturating_sub(started.elapsed());
            match tokio::time::timeout(remaining, live.recv()).await {
                Ok(Ok(event)) => {
                    if event.index < next_cursor {
                        continue;
                    }
                    next_cursor = event.index + 1;
                    terminal_seen = event.event_type.is_terminal();
                    yield Ok(sse_event(&event));
                }
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => {
                    for event in run.log.events_from(next_cursor) {
                        next_cursor = event.index + 1;
                        terminal_seen = event.event_type.is_terminal();
                        yield Ok(sse_event(&event));
                    }
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => break,
                Err(_) => break,
            }
        }

        if terminal_seen {
            yield Ok(SseEvent::default().event("complete").data("{}"));
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn sse_event(event: &RunEvent) -> SseEvent {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    SseEvent::default().id(event.index.to_string()).data(data)
}

/// GET /chat/ws/:run_id?cursor=N
pub async fn run_ws(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Query(query): Query<CursorQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(run) = state.registry.get(&run_id) else {
        return ApiError::NotFound(format!("run {}", run_id)).into_response();
    };
    let timeout = state.stream_timeout;
    ws.on_upgrade(move |socket| handle_run_socket(socket, run, query.cursor, timeout))
}

async fn handle_run_socket(
    mut socket: WebSocket,
    run: Arc<RunHandle>,
    cursor: u64,
    timeout: Duration,
) {
    let started = Instant::now();
    let (replay, mut live) = run.log.subscribe_from(cursor);
    let mut next_cursor = cursor;
    let mut terminal_seen = false;

    for event in replay {
        next_cursor = event.index + 1;
        terminal_seen = event.event_type.is_terminal();
        if send_event(&mut socket, &event).await.is_err() {
            return;
        }
    }

    let mut ping = tokio::time::interval(WS_PING_INTERVAL);
    ping.tick().await; // first tick fires immediately

    while !terminal_seen && started.elapsed() < timeout {
        tokio::select! {
            received = live.recv() => match received {
                Ok(event) => {
                    if event.index < next_cursor {
                        continue;
                    }
                    next_cursor = event.index + 1;
                    terminal_seen = event.event_type.is_terminal();
                    if send_event(&mut socket, &event).await.is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    for event in run.log.events_from(next_cursor) {
                        next_cursor = event.index + 1;
                        terminal_seen = event.event_type.is_terminal();
                        if send_event(&mut socket, &event).await.is_err() {
                            return;
                        }
                    }
                }
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
        }
    }

    if terminal_seen {
        let msg = json!({"type": "complete"}).to_string();
        let _ = socket.send(Message::Text(msg)).await;
    }
    let _ = socket.send(Message::Close(None)).await;
}

async fn send_event(socket: &mut WebSocket, event: &RunEvent) -> Result<(), axum::Error> {
    let msg = json!({
        "type": "event",
        "data": event,
        "index": event.index,
    })
    .to_string();
    socket.send(Message::Text(msg)).await
}
