//! HTTP, SSE, and WebSocket surface for lenslink.
//!
//! A thin shell over the engine: run admission (quota check, cached-path
//! shortcut, singleflight per pair), cursor-replaying event streams, and the
//! graph read endpoints with a global edge-update push channel.

pub mod admission;
pub mod api;
pub mod config;
pub mod ratelimit;

pub use admission::{spawn_run, synthesise_cached_run};
pub use api::routes::{create_router, AppState, OracleSet};
pub use config::ServerConfig;
pub use ratelimit::{Admission, SlidingWindowLimiter};
