//! Cache policy derived from request directives.
//!
//! Decides whether server-side caches may be consulted for a request, how
//! long remote fetches stay cached, and which HTTP cache headers the response
//! carries. Everything here is pure: directives in, decisions out.

use chrono::{DateTime, Duration, Utc};

/// Control parameter overriding the response lifetime.
pub const MAX_AGE_PARAM: &str = "max-age";

/// Control parameter overriding the remote-fetch cache lifetime.
pub const EXPIRE_URLS_PARAM: &str = "expire_urls";

/// Sentinel meaning "caching disabled" for both TTL parameters.
pub const DISABLED_TTL: u64 = 0;

/// Read-only projection of the request state that affects caching.
///
/// Header values and control parameters are kept raw; interpretation
/// happens in [`CachePolicy`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheDirectives {
    pub cache_control: Option<String>,
    pub pragma: Option<String>,
    pub if_modified_since: Option<String>,
    pub max_age: Option<String>,
    pub expire_urls: Option<String>,
}

/// Cache headers to attach to a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpCacheHeaders {
    pub max_age: u64,
    pub expires_at: DateTime<Utc>,
}

impl HttpCacheHeaders {
    /// `Cache-Control` header value.
    pub fn cache_control(&self) -> String {
        format!("max-age={}", self.max_age)
    }

    /// `Expires` header value as an HTTP-date.
    pub fn expires(&self) -> String {
        self.expires_at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
    }
}

/// Defaults applied when a request does not override a lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub default_max_age: u64,
    pub default_url_ttl: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self { default_max_age: 600, default_url_ttl: 300 }
    }
}

impl CachePolicy {
    /// Whether server-side caches may be read or written for this request.
    ///
    /// Any caching-related request header turns them off. This is looser than
    /// HTTP semantics but covers the shift-reload case. A present
    /// `If-Modified-Since` bypasses whether or not it parses.
    pub fn server_cache_allowed(&self, directives: &CacheDirectives) -> bool {
        if let Some(cache_control) = &directives.cache_control
            && (cache_control.contains("max-age") || cache_control.contains("no-cache"))
        {
            return false;
        }

        if let Some(pragma) = &directives.pragma
            && pragma.contains("no-cache")
        {
            return false;
        }

        if let Some(ims) = &directives.if_modified_since {
            if parse_http_date(ims).is_none() {
                tracing::debug!(value = %ims, "malformed If-Modified-Since, bypassing server caches");
            }
            return false;
        }

        true
    }

    /// Remote-fetch cache lifetime in seconds; `0` disables it.
    pub fn url_cache_ttl(&self, directives: &CacheDirectives) -> u64 {
        resolve_ttl(directives.expire_urls.as_deref(), DISABLED_TTL, self.default_url_ttl)
    }

    /// Response lifetime in seconds; `0` disables cache headers.
    pub fn response_max_age(&self, directives: &CacheDirectives) -> u64 {
        resolve_ttl(directives.max_age.as_deref(), DISABLED_TTL, self.default_max_age)
    }

    /// Cache headers for a response produced at `now`, if any.
    pub fn http_cache_headers(&self, directives: &CacheDirectives, now: DateTime<Utc>) -> Option<HttpCacheHeaders> {
        let max_age = self.response_max_age(directives);
        if max_age == DISABLED_TTL {
            return None;
        }
        let seconds = i64::try_from(max_age).unwrap_or(i64::MAX);
        let expires_at = Duration::try_seconds(seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Some(HttpCacheHeaders { max_age, expires_at })
    }
}

/// Interpret a raw integer parameter.
///
/// Absent or negative values fall back to `default_value`. Values that do not
/// parse at all yield `disabled_value`, so garbage never leads to caching.
pub fn resolve_ttl(raw: Option<&str>, disabled_value: u64, default_value: u64) -> u64 {
    let Some(raw) = raw else {
        return default_value;
    };
    match raw.trim().parse::<i64>() {
        Ok(seconds) if seconds >= 0 => seconds as u64,
        Ok(_) => default_value,
        Err(_) => disabled_value,
    }
}

/// Parse an HTTP-date (IMF-fixdate, which is RFC 2822 compatible).
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim()).ok().map(|dt| dt.with_timezone(&Utc))
}
