//! Cache stores for remote fetches and processed artifacts.
//!
//! The pipeline only sees the [`CacheStore`] capability. Two backends ship:
//!
//! - [`CacheDb`]: SQLite via tokio-rusqlite, WAL mode, versioned migrations
//! - [`MemoryStore`]: process-local map, used for tests and `cache_backend = "memory"`
//!
//! Both honour per-entry TTLs on read and support the background sweeper's
//! purge operations.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;

use std::time::Duration;

use async_trait::async_trait;

pub use crate::Error;

pub use connection::CacheDb;
pub use hash::Fingerprint;
pub use memory::MemoryStore;

/// Key/value cache capability with optional per-entry TTL.
///
/// Stores may evict at their own discretion; a `get` after a `put` is not
/// guaranteed to hit.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read a live entry. Expired entries read as `None`.
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error>;

    /// Insert or replace an entry. `None` keeps it until evicted.
    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<(), Error>;

    /// Remove an entry if present.
    async fn delete(&self, key: &[u8]) -> Result<(), Error>;

    /// Drop expired entries, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64, Error> {
        Ok(0)
    }

    /// Drop entries in write order until at most `max_entries` remain.
    /// Reads do not refresh an entry's age.
    async fn purge_oldest(&self, _max_entries: usize) -> Result<u64, Error> {
        Ok(0)
    }
}
