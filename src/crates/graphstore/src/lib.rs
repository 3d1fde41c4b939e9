//! Persistent co-appearance graph for lenslink.
//!
//! People are nodes, verified photographic co-appearances are undirected
//! edges carrying the best evidence seen so far. The store is SQLite-backed
//! and tolerates concurrent writers through idempotent max-confidence
//! upserts; the path engine answers shortest-path lookups over an adjacency
//! snapshot.

pub mod connection;
pub mod error;
pub mod models;
pub mod path;
pub mod store;

pub use connection::GraphDatabase;
pub use error::{GraphStoreError, Result};
pub use models::{CoAppearanceEdge, GraphSnapshot, GraphStats, PersonNode};
pub use path::{PathResult, PathStep};
pub use store::{EdgeEvidence, GraphStore};
