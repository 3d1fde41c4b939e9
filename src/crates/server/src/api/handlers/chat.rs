//! Investigation handlers: parse, admission, long-poll events, status.

use crate::admission::{spawn_run, synthesise_cached_run};
use crate::api::error::{ApiError, ApiResult};
use crate::api::routes::AppState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use domain::names_match;
use engine::{FinalOutcome, RunEvent, RunStatus};
use planner::ParsedQuery;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest a single long-poll request waits for new events.
const LONG_POLL_WAIT: Duration = Duration::from_secs(25);

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    pub text: String,
}

/// POST /chat/parse
pub async fn parse_query(
    State(state): State<AppState>,
    Json(body): Json<ParseRequest>,
) -> ApiResult<Json<ParsedQuery>> {
    let text = body.text.trim();
    if text.is_empty() {
        return Err(ApiError::Validation("text must not be empty".to_string()));
    }
    Ok(Json(state.planner.parse_query(text).await))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub person_a: String,
    pub person_b: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub run_id: String,
    pub status: String,
    pub person_a: String,
    pub person_b: String,
}

/// POST /chat/query
///
/// Admission order: quota, singleflight on the canonical pair, cached path
/// lookup, live run.
pub async fn start_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<QueryRequest>,
) -> ApiResult<Json<QueryResponse>> {
    let person_a = body.person_a.trim().to_string();
    let person_b = body.person_b.trim().to_string();
    if person_a.is_empty() || person_b.is_empty() {
        return Err(ApiError::Validation(
            "personA and personB are both required".to_string(),
        ));
    }
    if names_match(&person_a, &person_b).is_some() {
        return Err(ApiError::Validation(
            "personA and personB must be different people".to_string(),
        ));
    }

    let client = client_address(&headers);
    let admission = state.limiter.check(&client);
    if !admission.is_allowed() {
        return Err(ApiError::RateLimited {
            limit: state.limiter.max(),
            reset_at: admission.reset_at(),
        });
    }

    // An identical investigation already in flight is shared, not repeated.
    if let Some(active) = state.registry.find_active(&person_a, &person_b) {
        return Ok(Json(QueryResponse {
            run_id: active.run_id.clone(),
            status: "started".to_string(),
            person_a,
            person_b,
        }));
    }

    // Cache first: a known path answers instantly with a synthesised run.
    let cached = state.store.find_path(&person_a, &person_b).await?;
    if cached.found {
        let run = synthesise_cached_run(&person_a, &person_b, &cached);
        state.registry.insert(run.clone());
        return Ok(Json(QueryResponse {
            run_id: run.run_id.clone(),
            status: "started".to_string(),
            person_a,
            person_b,
        }));
    }

    let run = spawn_run(&state, &person_a, &person_b);
    tracing::info!(run_id = %run.run_id, %person_a, %person_b, "investigation started");
    Ok(Json(QueryResponse {
        run_id: run.run_id.clone(),
        status: "started".to_string(),
        person_a,
        person_b,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CursorQuery {
    #[serde(default)]
    pub cursor: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse {
    pub run_id: String,
    pub events: Vec<RunEvent>,
    pub complete: bool,
    /// Cursor to pass on the next poll
    pub cursor: u64,
}

/// GET /chat/events/:run_id?cursor=N
///
/// Returns immediately when events at or past the cursor exist; otherwise
/// waits up to [`LONG_POLL_WAIT`] for the next one.
pub async fn run_events(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Query(query): Query<CursorQuery>,
) -> ApiResult<Json<EventsResponse>> {
    let run = state
        .registry
        .get(&run_id)
        .ok_or_else(|| ApiError::NotFound(format!("run {}", run_id)))?;

    let (mut events, mut live) = run.log.subscribe_from(query.cursor);
    if events.is_empty() && !run.log.is_complete() {
        let deadline = tokio::time::sleep(LONG_POLL_WAIT);
        tokio::pin!(deadline);
        tokio::select! {
            received = live.recv() => {
                match received {
                    Ok(event) if event.index >= query.cursor => events.push(event),
                    // Lagged or a pre-cursor event: resync from the log.
                    _ => events = run.log.events_from(query.cursor),
                }
            }
            _ = &mut deadline => {}
        }
        // Drain anything else that arrived in the meantime.
        let next = events.last().map(|e| e.index + 1);
        if let Some(next) = next {
            events.extend(run.log.events_from(next));
        }
    }

    let cursor = events.last().map(|e| e.index + 1).unwrap_or(query.cursor);
    let complete = run.log.is_complete() && cursor >= run.log.len() as u64;
    Ok(Json(EventsResponse {
        run_id,
        events,
        complete,
        cursor,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub id: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<FinalOutcome>,
}

/// GET /chat/status/:run_id
pub async fn run_status(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let run = state
        .registry
        .get(&run_id)
        .ok_or_else(|| ApiError::NotFound(format!("run {}", run_id)))?;

    let events = run.log.events_from(0);
    let terminal = events.iter().rev().find(|e| e.event_type.is_terminal());
    let output = terminal.and_then(|e| e.data.result.clone());
    let error = match run.status() {
        RunStatus::Failed => terminal.map(|e| e.message.clone()),
        _ => None,
    };

    Ok(Json(StatusResponse {
        id: run.run_id.clone(),
        status: run.status(),
        error,
        output,
    }))
}

/// Best-effort client address for quota accounting: proxy headers first.
pub fn client_address(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
        })
        .unwrap_or_else(|| "local".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_address_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1.2.3.4, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "5.6.7.8".parse().unwrap());
        assert_eq!(client_address(&headers), "1.2.3.4");
    }

    #[test]
    fn test_client_address_falls_back() {
        let headers = HeaderMap::new();
        assert_eq!(client_address(&headers), "local");
    }
}
