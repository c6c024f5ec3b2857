//! reducer server entry point.
//!
//! Boots the HTTP minification proxy. Logs are JSON on stderr.

use std::sync::Arc;

use anyhow::{Context, Result};
use reducer_client::FetchClient;
use reducer_core::config::CacheBackend;
use reducer_core::{AppConfig, CacheDb, CacheStore, MemoryStore};
use reducer_server::{AppState, Pipeline, router, sweeper};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;

    let store: Arc<dyn CacheStore> = match config.cache_backend {
        CacheBackend::Sqlite => {
            let db = CacheDb::open(&config.db_path)
                .await
                .with_context(|| format!("opening cache database {}", config.db_path.display()))?;
            tracing::info!(path = %config.db_path.display(), entries = db.entry_count().await?, "opened cache database");
            Arc::new(db)
        }
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
    };

    let sweeper = config
        .purge_interval()
        .map(|interval| sweeper::spawn(Arc::clone(&store), interval, config.max_cache_entries));

    let fetcher = Arc::new(FetchClient::new((&config).into())?);
    let pipeline = Pipeline::new(store, fetcher, config.cache_policy()).with_artifact_ttl(config.artifact_ttl());
    let app = router(AppState::new(pipeline).with_max_body_bytes(config.max_body_bytes));

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    tracing::info!(
        addr = %config.bind_addr,
        backend = ?config.cache_backend,
        "Starting reducer server"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    tracing::info!("reducer server stopped");

    Ok(())
}
