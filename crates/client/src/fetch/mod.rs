//! HTTP fetch pipeline for remote references.
//!
//! ### URL Canonicalization
//! - Trim whitespace, require `http`/`https`
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### Safety Gates
//! - Deny private ranges (RFC1918, link-local, localhost, etc.), also on
//!   redirects to IP-literal hosts
//! - Resolve DNS and validate all A/AAAA answers are public
//! - Max redirects: 5 (configurable)
//! - Max body bytes: 5MB (configurable)

pub mod ssrf;
pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, StatusCode, header};
use std::time::{Duration, Instant};

pub use ssrf::{SsrfError, ensure_public_host, validate_ip};
pub use url::{UrlError, canonicalize, is_remote_reference};

use reducer_core::{AppConfig, Error};

/// Something that can dereference a remote reference into text.
///
/// The pipeline only depends on this; tests substitute a recording double.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET the URL and decode its body as UTF-8.
    async fn fetch_text(&self, url: &str) -> Result<String, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "reducer/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Refuse hosts resolving to private or reserved addresses (default: true)
    pub block_private_hosts: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "reducer/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            block_private_hosts: true,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
            block_private_hosts: config.block_private_hosts,
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The canonical URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Whether redirects moved the request away from the canonical URL.
    pub fn redirected(&self) -> bool {
        self.url != self.final_url
    }
}

/// HTTP fetch client with safety checks.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

fn redirect_policy(config: &FetchConfig) -> reqwest::redirect::Policy {
    let max_redirects = config.max_redirects;
    let block_private_hosts = config.block_private_hosts;
    reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_redirects {
            return attempt.error("too many redirects");
        }
        if block_private_hosts && redirects_to_private_ip(attempt.url()) {
            return attempt.error("redirect to private address");
        }
        attempt.follow()
    })
}

fn redirects_to_private_ip(url: &Url) -> bool {
    match url.host() {
        Some(::url::Host::Ipv4(v4)) => ssrf::is_private_or_reserved(v4.into()),
        Some(::url::Host::Ipv6(v6)) => ssrf::is_private_or_reserved(v6.into()),
        _ => false,
    }
}

fn map_send_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(err.to_string())
    } else {
        Error::HttpError(format!("network error: {}", err))
    }
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(redirect_policy(&config))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Fetch a URL, returning raw bytes and metadata.
    ///
    /// Performs the private-address check and respects redirect/byte limits.
    /// Non-success statuses are errors.
    pub async fn fetch(&self, url_str: &str) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let url = canonicalize(url_str).map_err(|e| Error::InvalidUrl(format!("{url_str}: {e}")))?;

        if self.config.block_private_hosts {
            ensure_public_host(&url)
                .await
                .map_err(|e| Error::PrivateAddress(e.to_string()))?;
        }

        let response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, "text/css,application/javascript,text/plain;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();

        if !status.is_success() {
            return Err(Error::HttpError(format!("{} returned status {}", url, status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response.bytes().await.map_err(map_send_error)?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        Ok(FetchResponse { url, final_url, status, content_type, bytes, fetch_ms })
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch_text(&self, url: &str) -> Result<String, Error> {
        let response = self.fetch(url).await?;
        tracing::debug!(
            url = %response.url,
            final_url = %response.final_url,
            redirected = response.redirected(),
            status = response.status.as_u16(),
            content_type = response.content_type.as_deref().unwrap_or("-"),
            bytes = response.bytes.len(),
            fetch_ms = response.fetch_ms,
            "fetched remote reference"
        );
        Ok(response.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "reducer/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
        assert!(config.block_private_hosts);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "custom/2".into(), timeout_ms: 1500, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "custom/2");
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    fn response(final_url: &str, body: &'static [u8]) -> FetchResponse {
        FetchResponse {
            url: Url::parse("https://example.com/a.css").unwrap(),
            final_url: Url::parse(final_url).unwrap(),
            status: StatusCode::OK,
            content_type: Some("text/css".to_string()),
            bytes: Bytes::from_static(body),
            fetch_ms: 3,
        }
    }

    #[test]
    fn test_response_text_is_lossy() {
        let response = response("https://example.com/a.css", b"a{content:\"\xff\"}");
        assert_eq!(response.text(), "a{content:\"\u{fffd}\"}");
    }

    #[test]
    fn test_response_redirected() {
        assert!(!response("https://example.com/a.css", b"a{}").redirected());
        assert!(response("https://cdn.example.com/v2/a.css", b"a{}").redirected());
    }

    #[test]
    fn test_redirect_target_check() {
        assert!(redirects_to_private_ip(&Url::parse("http://10.0.0.8/x").unwrap()));
        assert!(!redirects_to_private_ip(&Url::parse("http://example.com/x").unwrap()));
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        assert!(FetchClient::new(FetchConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_rejects_malformed_url() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let result = client.fetch_text("http://exa mple.com/a.js").await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_blocks_loopback() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let result = client.fetch_text("http://127.0.0.1:9/a.js").await;
        assert!(matches!(result, Err(Error::PrivateAddress(_))));
    }
}
