//! HTTP minification proxy for reducer.
//!
//! This crate wires the core cache stores and the client processors into an
//! axum service:
//! - [`pipeline`]: source collection, remote fetch cache, artifact cache
//! - [`handler`]: routes and request dispatch
//! - [`sweeper`]: background cache maintenance

pub mod error;
pub mod handler;
pub mod pipeline;
pub mod sweeper;

pub use error::ApiError;
pub use handler::{AppState, router};
pub use pipeline::{Pipeline, Reply};
