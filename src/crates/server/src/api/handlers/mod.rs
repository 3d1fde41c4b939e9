//! Request handlers.

pub mod chat;
pub mod graph;
pub mod health;
pub mod stream;

pub use chat::{parse_query, run_events, run_status, start_run};
pub use graph::{graph_path, graph_snapshot, graph_stats, graph_ws};
pub use health::health;
pub use stream::{run_sse, run_ws};
