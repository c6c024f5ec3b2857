//! The aggregation-and-caching pipeline.
//!
//! ### Flow
//! 1. Collect fragments (uploads, or parameters with remote references
//!    resolved through the remote fetch cache)
//! 2. Aggregate into canonical content; empty content is a client error
//! 3. Fingerprint the content (SHA-256)
//! 4. Look up the artifact cache, unless the request bypasses server caches
//! 5. On a miss, run the processor on the blocking pool and store cacheable
//!    output
//! 6. Render with cache headers derived from the request's directives
//!
//! Cache store failures are logged and treated as misses; they never fail a
//! request.

pub mod collect;
pub mod remote;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use reducer_client::fetch::Fetcher;
use reducer_client::minify::{Diagnostics, Processed, Processor};
use reducer_core::{CacheDirectives, CachePolicy, CacheStore, CanonicalContent, Error, Fingerprint, Fragment, HttpCacheHeaders};

use crate::error::TEXT_PLAIN;

pub use collect::{ParamMap, collect_uploads, directives, is_reserved, parse_params};

/// A rendered pipeline outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
    pub cache: Option<HttpCacheHeaders>,
}

impl Reply {
    fn output(content_type: &'static str, body: String, cache: Option<HttpCacheHeaders>) -> Self {
        Self { status: StatusCode::OK, content_type, body, cache }
    }

    /// Diagnostics are reported with a 404 and no cache headers.
    fn rejected(diagnostics: &Diagnostics) -> Self {
        Self { status: StatusCode::NOT_FOUND, content_type: TEXT_PLAIN, body: diagnostics.report(), cache: None }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut response = (self.status, [(header::CONTENT_TYPE, self.content_type)], self.body).into_response();
        if let Some(cache) = self.cache {
            let headers = response.headers_mut();
            if let Ok(value) = cache.cache_control().parse() {
                headers.insert(header::CACHE_CONTROL, value);
            }
            if let Ok(value) = cache.expires().parse() {
                headers.insert(header::EXPIRES, value);
            }
        }
        response
    }
}

/// Shared pipeline state: the cache store, the remote fetcher and the policy
/// defaults. Processors are chosen per request.
pub struct Pipeline {
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    policy: CachePolicy,
    artifact_ttl: Option<Duration>,
}

impl Pipeline {
    pub fn new(store: Arc<dyn CacheStore>, fetcher: Arc<dyn Fetcher>, policy: CachePolicy) -> Self {
        Self { store, fetcher, policy, artifact_ttl: None }
    }

    /// Store-level lifetime for artifacts; `None` keeps them until evicted.
    pub fn with_artifact_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.artifact_ttl = ttl;
        self
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Aggregate `fragments`, then serve the artifact from cache or build it.
    pub async fn run(
        &self, fragments: &[Fragment], directives: &CacheDirectives, processor: Arc<dyn Processor>,
    ) -> Result<Reply, Error> {
        let content = CanonicalContent::aggregate(fragments).ok_or(Error::NoData)?;
        let fingerprint = content.fingerprint();
        let allowed = self.policy.server_cache_allowed(directives);
        let cache_headers = self.policy.http_cache_headers(directives, Utc::now());

        if allowed && let Some(cached) = self.lookup(&fingerprint).await {
            tracing::debug!(processor = processor.name(), %fingerprint, "artifact cache hit");
            return Ok(Reply::output(processor.content_type(), cached, cache_headers));
        }

        tracing::debug!(processor = processor.name(), %fingerprint, bypass = !allowed, "running processor");
        let worker = Arc::clone(&processor);
        let source = content.into_string();
        let processed = tokio::task::spawn_blocking(move || worker.process(&source)).await.map_err(|e| {
            tracing::error!(processor = processor.name(), %fingerprint, error = %e, "processor task failed");
            Error::ProcessorFailed(format!("{} processor task failed: {e}", processor.name()))
        })?;

        match processed {
            Processed::Minified(output) => {
                if allowed {
                    self.store_artifact(&fingerprint, &output).await;
                }
                Ok(Reply::output(processor.content_type(), output, cache_headers))
            }
            Processed::Rejected(diagnostics) => {
                tracing::debug!(processor = processor.name(), %fingerprint, "processor rejected input");
                Ok(Reply::rejected(&diagnostics))
            }
        }
    }

    async fn lookup(&self, fingerprint: &Fingerprint) -> Option<String> {
        match self.store.get(fingerprint.as_bytes()).await {
            Ok(Some(bytes)) => String::from_utf8(bytes)
                .inspect_err(|_| tracing::warn!(%fingerprint, "cached artifact is not UTF-8, rebuilding"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(%fingerprint, error = %e, "artifact cache read failed");
                None
            }
        }
    }

    async fn store_artifact(&self, fingerprint: &Fingerprint, output: &str) {
        if let Err(e) = self.store.put(fingerprint.as_bytes(), output.as_bytes(), self.artifact_ttl).await {
            tracing::warn!(%fingerprint, error = %e, "artifact cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reducer_client::minify::{Diagnostic, Transform};
    use reducer_core::MemoryStore;

    struct NoFetch;

    #[async_trait]
    impl Fetcher for NoFetch {
        async fn fetch_text(&self, url: &str) -> Result<String, Error> {
            Err(Error::HttpError(format!("unexpected fetch of {url}")))
        }
    }

    struct Reject;

    impl Processor for Reject {
        fn name(&self) -> &'static str {
            "reject"
        }

        fn content_type(&self) -> &'static str {
            "text/css; charset=utf-8"
        }

        fn process(&self, _source: &str) -> Processed {
            Processed::Rejected(Diagnostic::error_at(1, 1, "nope").into())
        }
    }

    struct Explode;

    impl Processor for Explode {
        fn name(&self) -> &'static str {
            "explode"
        }

        fn content_type(&self) -> &'static str {
            "text/css; charset=utf-8"
        }

        fn process(&self, _source: &str) -> Processed {
            panic!("processor bug")
        }
    }

    fn pipeline(store: &MemoryStore) -> Pipeline {
        Pipeline::new(Arc::new(store.clone()), Arc::new(NoFetch), CachePolicy::default())
    }

    #[tokio::test]
    async fn test_empty_content_is_no_data() {
        let store = MemoryStore::new();
        let fragments = [Fragment::inline("a", "  \n ")];
        let result = pipeline(&store).run(&fragments, &CacheDirectives::default(), Arc::new(Reject)).await;
        assert!(matches!(result, Err(Error::NoData)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_miss_stores_under_fingerprint() {
        let store = MemoryStore::new();
        let fragments = [Fragment::inline("a", "body { color: red; }")];
        let css = Transform::Css.processor();

        let reply = pipeline(&store).run(&fragments, &CacheDirectives::default(), css).await.unwrap();
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.cache.as_ref().map(|c| c.max_age), Some(600));

        let key = Fingerprint::of(b"body { color: red; }");
        let stored = store.get(key.as_bytes()).await.unwrap().unwrap();
        assert_eq!(String::from_utf8(stored).unwrap(), reply.body);
    }

    #[tokio::test]
    async fn test_rejection_is_not_cached_and_has_no_headers() {
        let store = MemoryStore::new();
        let reply = pipeline(&store)
            .run(&[Fragment::inline("a", "x")], &CacheDirectives::default(), Arc::new(Reject))
            .await
            .unwrap();

        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(reply.body, "Errors:\n[ERROR] 1:1 nope\n");
        assert_eq!(reply.content_type, TEXT_PLAIN);
        assert!(reply.cache.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_panicking_processor_is_an_error() {
        let store = MemoryStore::new();
        let result =
            pipeline(&store).run(&[Fragment::inline("a", "x")], &CacheDirectives::default(), Arc::new(Explode)).await;

        match result {
            Err(Error::ProcessorFailed(message)) => assert!(message.contains("explode")),
            other => panic!("expected a processor failure, got {other:?}"),
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_reply_headers() {
        let directives = CacheDirectives { max_age: Some("60".into()), ..Default::default() };
        let cache = CachePolicy::default().http_cache_headers(&directives, Utc::now());
        let response = Reply::output("text/css; charset=utf-8", "a{}".into(), cache).into_response();

        assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=60");
        assert!(response.headers()[header::EXPIRES].to_str().unwrap().ends_with(" GMT"));
    }
}
