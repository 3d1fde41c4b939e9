//! API layer: routes, handlers, error mapping, CORS.

pub mod cors;
pub mod error;
pub mod handlers;
pub mod routes;

pub use error::{ApiError, ApiResult};
