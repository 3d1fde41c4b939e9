//! Shared identity and scoring primitives for lenslink
//!
//! This crate is the leaf of the workspace: name normalisation and the
//! deterministic node/edge ids derived from it, the ordered name-matching
//! rules used to compare face detections against investigation targets, and
//! the confidence calculus applied to evidence images and paths.

pub mod confidence;
pub mod matching;
pub mod normalise;

pub use confidence::{bottleneck, cumulative, image_score};
pub use matching::{names_match, MatchRule};
pub use normalise::{edge_id, node_id, normalise_name};
