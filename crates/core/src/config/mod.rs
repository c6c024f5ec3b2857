//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (REDUCER_*)
//! 2. TOML config file (if REDUCER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::policy::CachePolicy;

mod validation;

pub use validation::ConfigError;

/// Which cache store backs the remote-fetch and artifact caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Persistent SQLite file at `db_path`.
    Sqlite,
    /// Process-local map, lost on restart.
    Memory,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (REDUCER_*)
/// 2. TOML config file (if REDUCER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP server listens on.
    ///
    /// Set via REDUCER_BIND_ADDR environment variable.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Cache store backend.
    ///
    /// Set via REDUCER_CACHE_BACKEND environment variable (`sqlite` or `memory`).
    #[serde(default = "default_cache_backend")]
    pub cache_backend: CacheBackend,

    /// Path to SQLite cache database.
    ///
    /// Set via REDUCER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for remote fetches.
    ///
    /// Set via REDUCER_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per remote reference.
    ///
    /// Set via REDUCER_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Remote fetch timeout in milliseconds.
    ///
    /// Set via REDUCER_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects followed by a remote fetch.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Refuse remote references that resolve to private or reserved addresses.
    ///
    /// Set via REDUCER_BLOCK_PRIVATE_HOSTS environment variable.
    #[serde(default = "default_true")]
    pub block_private_hosts: bool,

    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Response `max-age` when the request does not override it.
    #[serde(default = "default_max_age_secs")]
    pub default_max_age_secs: u64,

    /// Remote-fetch cache lifetime when the request does not override it.
    #[serde(default = "default_url_ttl_secs")]
    pub default_url_ttl_secs: u64,

    /// Store-level lifetime of processed artifacts. 0 keeps them until purged.
    #[serde(default = "default_artifact_ttl_secs")]
    pub artifact_ttl_secs: u64,

    /// Entry cap enforced by the background sweeper. 0 means unbounded.
    #[serde(default = "default_max_cache_entries")]
    pub max_cache_entries: usize,

    /// Interval between background cache sweeps. 0 disables the sweeper.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".into()
}

fn default_cache_backend() -> CacheBackend {
    CacheBackend::Sqlite
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./reducer-cache.sqlite")
}

fn default_user_agent() -> String {
    "reducer/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_max_age_secs() -> u64 {
    600
}

fn default_url_ttl_secs() -> u64 {
    300
}

fn default_artifact_ttl_secs() -> u64 {
    86_400
}

fn default_max_cache_entries() -> usize {
    10_000
}

fn default_purge_interval_secs() -> u64 {
    300
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cache_backend: default_cache_backend(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            block_private_hosts: true,
            max_body_bytes: default_max_body_bytes(),
            default_max_age_secs: default_max_age_secs(),
            default_url_ttl_secs: default_url_ttl_secs(),
            artifact_ttl_secs: default_artifact_ttl_secs(),
            max_cache_entries: default_max_cache_entries(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Store-level artifact lifetime, `None` when artifacts never expire on their own.
    pub fn artifact_ttl(&self) -> Option<Duration> {
        (self.artifact_ttl_secs > 0).then(|| Duration::from_secs(self.artifact_ttl_secs))
    }

    /// Sweeper interval, `None` when the sweeper is disabled.
    pub fn purge_interval(&self) -> Option<Duration> {
        (self.purge_interval_secs > 0).then(|| Duration::from_secs(self.purge_interval_secs))
    }

    /// Cache policy seeded with the configured defaults.
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy { default_max_age: self.default_max_age_secs, default_url_ttl: self.default_url_ttl_secs }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `REDUCER_`
    /// 2. TOML file from `REDUCER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("REDUCER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("REDUCER_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.cache_backend, CacheBackend::Sqlite);
        assert_eq!(config.db_path, PathBuf::from("./reducer-cache.sqlite"));
        assert_eq!(config.user_agent, "reducer/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert!(config.block_private_hosts);
        assert_eq!(config.default_max_age_secs, 600);
        assert_eq!(config.default_url_ttl_secs, 300);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_zero_durations_disable() {
        let config = AppConfig { artifact_ttl_secs: 0, purge_interval_secs: 0, ..Default::default() };
        assert_eq!(config.artifact_ttl(), None);
        assert_eq!(config.purge_interval(), None);
    }

    #[test]
    fn test_cache_policy_uses_defaults() {
        let config = AppConfig { default_max_age_secs: 60, default_url_ttl_secs: 30, ..Default::default() };
        let policy = config.cache_policy();
        assert_eq!(policy.default_max_age, 60);
        assert_eq!(policy.default_url_ttl, 30);
    }

    #[test]
    fn test_load_from_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("REDUCER_CACHE_BACKEND", "memory");
            jail.set_env("REDUCER_DEFAULT_MAX_AGE_SECS", "42");
            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.cache_backend, CacheBackend::Memory);
            assert_eq!(config.default_max_age_secs, 42);
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("reducer.toml", "user_agent = \"custom/1.0\"\ntimeout_ms = 500\n")?;
            jail.set_env("REDUCER_CONFIG_FILE", "reducer.toml");
            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.user_agent, "custom/1.0");
            assert_eq!(config.timeout_ms, 500);
            Ok(())
        });
    }
}
