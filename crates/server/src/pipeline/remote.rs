//! Remote fetch cache.
//!
//! Dereferenced URL bodies are cached under the literal URL string, separately
//! from artifacts. A request that disables URL caching (or server caching as a
//! whole) also evicts any stale entry for the URL before fetching it live.

use std::time::Duration;

use reducer_core::policy::DISABLED_TTL;
use reducer_core::{CacheDirectives, Error};

use super::Pipeline;

impl Pipeline {
    /// Body of `url`, from the cache when allowed, otherwise fetched live.
    ///
    /// Fetch failures end the request; nothing is cached for a failed URL.
    pub async fn resolve_remote(&self, directives: &CacheDirectives, url: &str) -> Result<String, Error> {
        let ttl = self.policy.url_cache_ttl(directives);
        let key = url.as_bytes();

        if ttl == DISABLED_TTL || !self.policy.server_cache_allowed(directives) {
            if let Err(e) = self.store.delete(key).await {
                tracing::warn!(url, error = %e, "failed to evict remote cache entry");
            }
        } else {
            match self.store.get(key).await {
                Ok(Some(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => {
                        tracing::debug!(url, "remote cache hit");
                        return Ok(text);
                    }
                    Err(_) => tracing::warn!(url, "remote cache entry is not UTF-8, refetching"),
                },
                Ok(None) => tracing::debug!(url, "remote cache miss"),
                Err(e) => tracing::warn!(url, error = %e, "remote cache read failed"),
            }
        }

        let text = self.fetcher.fetch_text(url).await?;

        if ttl != DISABLED_TTL
            && let Err(e) = self.store.put(key, text.as_bytes(), Some(Duration::from_secs(ttl))).await
        {
            tracing::warn!(url, error = %e, "remote cache write failed");
        }

        Ok(text)
    }
}
