//! Range and consistency checks run after every configuration load.

use std::net::SocketAddr;

use crate::config::{AppConfig, CacheBackend};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

/// Upper bound for `max_bytes`.
const MAX_FETCH_BYTES: usize = 50 * 1024 * 1024;

/// Accepted range for `timeout_ms`.
const TIMEOUT_RANGE_MS: std::ops::RangeInclusive<u64> = 100..=300_000;

fn ensure(ok: bool, field: &str, reason: impl Into<String>) -> Result<(), ConfigError> {
    if ok { Ok(()) } else { Err(ConfigError::Invalid { field: field.to_string(), reason: reason.into() }) }
}

impl AppConfig {
    /// Check loaded values; the first violation wins.
    ///
    /// Rejects an unparseable `bind_addr`, a `max_bytes` of 0 or above 50MB,
    /// a `timeout_ms` outside 100ms..=5min, an empty `user_agent`, a zero
    /// `max_body_bytes`, and an empty `db_path` for the SQLite backend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(
            self.bind_addr.parse::<SocketAddr>().is_ok(),
            "bind_addr",
            format!("not a socket address: {}", self.bind_addr),
        )?;
        ensure(self.max_bytes > 0, "max_bytes", "must be greater than 0")?;
        ensure(self.max_bytes <= MAX_FETCH_BYTES, "max_bytes", "must not exceed 50MB")?;
        ensure(
            TIMEOUT_RANGE_MS.contains(&self.timeout_ms),
            "timeout_ms",
            format!("must be between {}ms and {}ms", TIMEOUT_RANGE_MS.start(), TIMEOUT_RANGE_MS.end()),
        )?;
        ensure(!self.user_agent.trim().is_empty(), "user_agent", "must not be empty")?;
        ensure(self.max_body_bytes > 0, "max_body_bytes", "must be greater than 0")?;
        ensure(
            self.cache_backend != CacheBackend::Sqlite || !self.db_path.as_os_str().is_empty(),
            "db_path",
            "must be set when cache_backend is sqlite",
        )?;

        if self.max_cache_entries > 0 && self.purge_interval_secs == 0 {
            tracing::warn!(
                max_cache_entries = self.max_cache_entries,
                "entry cap has no effect while the sweeper is disabled"
            );
        }

        Ok(())
    }
}
