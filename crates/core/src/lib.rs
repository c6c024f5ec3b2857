//! Core types and shared functionality for reducer.
//!
//! This crate provides:
//! - Cache store abstraction with SQLite and in-memory backends
//! - Content fragments, aggregation and fingerprinting
//! - Cache policy derived from request directives
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod policy;

pub use cache::{CacheDb, CacheStore, Fingerprint, MemoryStore};
pub use config::AppConfig;
pub use content::{CanonicalContent, Fragment, Origin};
pub use error::Error;
pub use policy::{CacheDirectives, CachePolicy, HttpCacheHeaders};
