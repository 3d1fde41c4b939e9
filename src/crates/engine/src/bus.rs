//! Per-run event log, run registry, and the global graph broadcaster.
//!
//! A [`RunLog`] is an append-only indexed log with live fan-out: subscribers
//! replay from any cursor and then tail a broadcast channel. Appending never
//! waits on subscribers; a receiver that lags simply resyncs from the log by
//! cursor. The [`RunRegistry`] keys live and recently-finished runs by id
//! and sweeps terminal runs after a TTL.

use crate::events::{EventData, EventType, RunEvent};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of the live broadcast channel behind each run log.
const LIVE_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

/// Append-only event log for one run.
pub struct RunLog {
    run_id: String,
    events: RwLock<Vec<RunEvent>>,
    live: broadcast::Sender<RunEvent>,
}

impl RunLog {
    /// Create an empty log for a run.
    pub fn new(run_id: impl Into<String>) -> Self {
        let (live, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        Self {
            run_id: run_id.into(),
            events: RwLock::new(Vec::new()),
            live,
        }
    }

    /// The run this log belongs to.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Append one event, assigning the next index and a fresh event id, and
    /// push it to live subscribers. Returns the stored record.
    pub fn append(
        &self,
        event_type: EventType,
        message: impl Into<String>,
        mut data: EventData,
    ) -> RunEvent {
        data.event_id = Some(Uuid::new_v4().to_string());

        let mut events = self.events.write();
        let event = RunEvent {
            index: events.len() as u64,
            event_type,
            run_id: self.run_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            message: message.into(),
            data,
        };
        events.push(event.clone());
        // Send while holding the write lock so live order matches log order.
        // A send error just means nobody is listening right now.
        let _ = self.live.send(event.clone());
        event
    }

    /// All events with `index >= cursor`, in order.
    pub fn events_from(&self, cursor: u64) -> Vec<RunEvent> {
        let events = self.events.read();
        let start = (cursor as usize).min(events.len());
        events[start..].to_vec()
    }

    /// Replay from `cursor` plus a live receiver for everything after the
    /// replayed batch. The receiver is subscribed under the log lock, so no
    /// event can fall between replay and tail.
    pub fn subscribe_from(&self, cursor: u64) -> (Vec<RunEvent>, broadcast::Receiver<RunEvent>) {
        let events = self.events.read();
        let start = (cursor as usize).min(events.len());
        let replay = events[start..].to_vec();
        let receiver = self.live.subscribe();
        (replay, receiver)
    }

    /// Number of events appended so far.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// True when no events have been appended.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// True once a terminal event has been appended.
    pub fn is_complete(&self) -> bool {
        self.events
            .read()
            .last()
            .map(|e| e.event_type.is_terminal())
            .unwrap_or(false)
    }
}

/// One investigation run and its log.
pub struct RunHandle {
    pub run_id: String,
    pub person_a: String,
    pub person_b: String,
    pub log: RunLog,
    status: RwLock<RunStatus>,
    cancelled: AtomicBool,
    started_at: Instant,
    finished_at: RwLock<Option<Instant>>,
}

impl RunHandle {
    /// Create a fresh running handle.
    pub fn new(person_a: impl Into<String>, person_b: impl Into<String>) -> Self {
        let run_id = Uuid::new_v4().to_string();
        Self {
            log: RunLog::new(run_id.clone()),
            run_id,
            person_a: person_a.into(),
            person_b: person_b.into(),
            status: RwLock::new(RunStatus::Running),
            cancelled: AtomicBool::new(false),
            started_at: Instant::now(),
            finished_at: RwLock::new(None),
        }
    }

    /// Current status.
    pub fn status(&self) -> RunStatus {
        *self.status.read()
    }

    /// Mark the run finished with the given status.
    pub fn finish(&self, status: RunStatus) {
        *self.status.write() = status;
        *self.finished_at.write() = Some(Instant::now());
    }

    /// Request cancellation; the orchestrator observes it at its next
    /// suspension point.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// True when cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Canonical key for the investigated pair, used for singleflight.
    pub fn pair_key(&self) -> String {
        domain::edge_id(&self.person_a, &self.person_b)
    }

    fn expired(&self, ttl: Duration) -> bool {
        self.finished_at
            .read()
            .map(|at| at.elapsed() > ttl)
            .unwrap_or(false)
    }
}

/// Registry of runs keyed by run id.
pub struct RunRegistry {
    runs: DashMap<String, Arc<RunHandle>>,
    ttl: Duration,
}

impl RunRegistry {
    /// Create a registry with the given terminal-run TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            runs: DashMap::new(),
            ttl,
        }
    }

    /// Register a run.
    pub fn insert(&self, run: Arc<RunHandle>) {
        self.runs.insert(run.run_id.clone(), run);
    }

    /// Look up a run by id.
    pub fn get(&self, run_id: &str) -> Option<Arc<RunHandle>> {
        self.runs.get(run_id).map(|r| Arc::clone(&r))
    }

    /// Find a still-running investigation of the same canonical pair.
    pub fn find_active(&self, person_a: &str, person_b: &str) -> Option<Arc<RunHandle>> {
        let key = domain::edge_id(person_a, person_b);
        self.runs
            .iter()
            .find(|entry| entry.status() == RunStatus::Running && entry.pair_key() == key)
            .map(|entry| Arc::clone(&entry))
    }

    /// Number of registered runs.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// True when no runs are registered.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Drop terminal runs whose TTL elapsed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let expired: Vec<String> = self
            .runs
            .iter()
            .filter(|entry| entry.status() != RunStatus::Running && entry.expired(self.ttl))
            .map(|entry| entry.run_id.clone())
            .collect();
        for run_id in &expired {
            self.runs.remove(run_id);
            tracing::debug!(run_id, "expired run collected");
        }
        expired.len()
    }

    /// Spawn a background task sweeping at the given interval.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.sweep();
            }
        })
    }
}

/// Graph edge delta pushed to global subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EdgeUpdate {
    pub source: String,
    pub target: String,
    pub confidence: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_url: Option<String>,
}

/// Process-wide broadcaster of graph edge updates.
///
/// Many writers, many readers; publishing never blocks on subscribers.
#[derive(Clone)]
pub struct GraphBroadcaster {
    tx: broadcast::Sender<EdgeUpdate>,
}

impl GraphBroadcaster {
    /// Create a new broadcaster.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an edge update to all subscribers.
    pub fn publish(&self, update: EdgeUpdate) {
        let _ = self.tx.send(update);
    }

    /// Subscribe to future edge updates.
    pub fn subscribe(&self) -> broadcast::Receiver<EdgeUpdate> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for GraphBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_increasing_indices() {
        let log = RunLog::new("run-1");
        for i in 0..5 {
            let event = log.append(EventType::Status, format!("event {}", i), EventData::new());
            assert_eq!(event.index, i);
            assert!(event.data.event_id.is_some());
        }
        assert_eq!(log.len(), 5);
    }

    #[test]
    fn test_events_from_cursor() {
        let log = RunLog::new("run-1");
        for i in 0..10 {
            log.append(EventType::Status, format!("event {}", i), EventData::new());
        }

        let tail = log.events_from(7);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].index, 7);

        assert!(log.events_from(100).is_empty());
        assert_eq!(log.events_from(0).len(), 10);
    }

    #[test]
    fn test_complete_after_terminal_event() {
        let log = RunLog::new("run-1");
        log.append(EventType::Status, "started", EventData::new());
        assert!(!log.is_complete());
        log.append(EventType::NoPath, "nothing found", EventData::new());
        assert!(log.is_complete());
    }

    #[tokio::test]
    async fn test_subscribe_replays_then_tails() {
        let log = Arc::new(RunLog::new("run-1"));
        for i in 0..3 {
            log.append(EventType::Status, format!("early {}", i), EventData::new());
        }

        let (replay, mut live) = log.subscribe_from(0);
        assert_eq!(replay.len(), 3);

        log.append(EventType::Status, "late", EventData::new());
        let tailed = live.recv().await.unwrap();
        assert_eq!(tailed.index, 3);
        assert_eq!(tailed.message, "late");
    }

    #[test]
    fn test_append_without_subscribers_never_blocks() {
        let log = RunLog::new("run-1");
        for i in 0..(LIVE_CHANNEL_CAPACITY * 2) {
            log.append(EventType::Status, format!("event {}", i), EventData::new());
        }
        assert_eq!(log.len(), LIVE_CHANNEL_CAPACITY * 2);
    }

    #[test]
    fn test_registry_singleflight_lookup() {
        let registry = RunRegistry::new(Duration::from_secs(3600));
        let run = Arc::new(RunHandle::new("Elon Musk", "Beyonce"));
        registry.insert(Arc::clone(&run));

        // Same pair in either order resolves to the active run.
        assert!(registry.find_active("Beyonce", "Elon Musk").is_some());
        assert!(registry.find_active("Elon Musk", "Rihanna").is_none());

        run.finish(RunStatus::Failed);
        assert!(registry.find_active("Elon Musk", "Beyonce").is_none());
    }

    #[test]
    fn test_registry_sweep_honours_ttl() {
        let registry = RunRegistry::new(Duration::from_secs(0));
        let running = Arc::new(RunHandle::new("A", "B"));
        let finished = Arc::new(RunHandle::new("C", "D"));
        finished.finish(RunStatus::Success);

        registry.insert(Arc::clone(&running));
        registry.insert(Arc::clone(&finished));

        std::thread::sleep(Duration::from_millis(5));
        let removed = registry.sweep();
        assert_eq!(removed, 1);
        assert!(registry.get(&running.run_id).is_some());
        assert!(registry.get(&finished.run_id).is_none());
    }

    #[tokio::test]
    async fn test_broadcaster_fan_out() {
        let broadcaster = GraphBroadcaster::new();
        let mut rx1 = broadcaster.subscribe();
        let mut rx2 = broadcaster.subscribe();

        broadcaster.publish(EdgeUpdate {
            source: "A".to_string(),
            target: "B".to_string(),
            confidence: 91,
            thumbnail_url: None,
            context_url: None,
        });

        assert_eq!(rx1.recv().await.unwrap().confidence, 91);
        assert_eq!(rx2.recv().await.unwrap().source, "A");
    }

    #[test]
    fn test_cancellation_flag() {
        let run = RunHandle::new("A", "B");
        assert!(!run.is_cancelled());
        run.cancel();
        assert!(run.is_cancelled());
    }
}
