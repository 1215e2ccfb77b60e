//! Caching, rate-limited HTTP client for metal-archives.com
//!
//! Every request goes through the [`CacheStore`] first. Only cache misses reach
//! the network, and every live request passes one shared [`RateLimiter`] gate.
//! Concurrent requests for the same URL are coalesced: the first caller fetches
//! and fills the cache while the others wait and then read the cached body.
//! The coalescing table lives in the cache store, so it spans every client
//! sharing that store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, REFERER};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::cache::{default_cache_dir, CacheStore, DEFAULT_CACHE_TTL};
use crate::error::{MetallumError, Result};

/// Base URL for metal-archives.com
pub const METALLUM_BASE_URL: &str = "https://www.metal-archives.com";

/// Default User-Agent mimicking a desktop Safari
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15";

/// Accept header of the site's own AJAX calls
const DEFAULT_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";

/// Default Accept-Language header
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Minimum interval between two live requests
const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// Rate limiter to control request frequency
///
/// Ensures that requests are spaced at least `min_interval` apart
/// to avoid overwhelming the origin server. One limiter is meant to be
/// shared by every client talking to the same origin.
pub struct RateLimiter {
    /// Minimum interval between requests
    min_interval: Duration,
    /// Timestamp of the last request
    last_request: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the specified requests per second
    ///
    /// # Example
    /// ```
    /// use metallum_core::client::RateLimiter;
    ///
    /// let limiter = RateLimiter::new(2.0); // 2 requests per second
    /// ```
    pub fn new(requests_per_second: f64) -> Self {
        Self::with_interval(Duration::from_secs_f64(1.0 / requests_per_second))
    }

    /// Create a rate limiter enforcing `min_interval` between requests
    pub fn with_interval(min_interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            min_interval,
            last_request: Arc::new(Mutex::new(now.checked_sub(min_interval).unwrap_or(now))),
        }
    }

    /// Acquire permission to make a request
    ///
    /// This method will wait if necessary to ensure the minimum interval
    /// between requests is respected.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();

        if elapsed < self.min_interval {
            let wait_time = self.min_interval - elapsed;
            debug!("Rate limiter waiting {:?}", wait_time);
            sleep(wait_time).await;
        }

        *last = Instant::now();
    }

    /// Get the minimum interval between requests
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

/// Configuration for the Metallum HTTP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin every relative path is resolved against
    pub base_url: String,
    /// User-Agent header value
    pub user_agent: String,
    /// Minimum interval between live requests (default: 1s)
    pub request_interval: Duration,
    /// Transport timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Directory of the page cache (default: `<temp>/metallum_cache`)
    pub cache_dir: PathBuf,
    /// Freshness window of cached pages (default: 300s)
    pub cache_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: METALLUM_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_interval: DEFAULT_REQUEST_INTERVAL,
            timeout_secs: 30,
            cache_dir: default_cache_dir(),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// HTTP client for metal-archives.com with caching and rate limiting
///
/// This client automatically:
/// - Serves fresh pages from the disk cache without touching the network
/// - Spaces live requests through a shared rate limiter
/// - Coalesces concurrent requests for the same URL
/// - Sends the header set of the site's own AJAX requests
pub struct MetallumClient {
    /// Underlying HTTP client
    client: reqwest::Client,
    /// Origin for relative paths, without trailing slash
    base_url: String,
    /// Page cache consulted before every request
    cache: Arc<CacheStore>,
    /// Rate limiter for request throttling
    rate_limiter: Arc<RateLimiter>,
}

impl MetallumClient {
    /// Create a new client with default configuration
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with its own cache store and rate limiter
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let cache = Arc::new(CacheStore::new(config.cache_dir.clone(), config.cache_ttl));
        let rate_limiter = Arc::new(RateLimiter::with_interval(config.request_interval));
        Self::with_parts(config, cache, rate_limiter)
    }

    /// Create a client sharing an existing cache store and rate limiter
    ///
    /// `config.cache_dir`, `config.cache_ttl` and `config.request_interval`
    /// are ignored in favour of the given instances.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created
    pub fn with_parts(
        config: ClientConfig,
        cache: Arc<CacheStore>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let referer = HeaderValue::from_str(&format!("{}/", base_url))
            .map_err(|_| MetallumError::InvalidUrl(config.base_url.clone()))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));
        headers.insert(REFERER, referer);
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        // gzip + deflate also sets `Accept-Encoding: gzip, deflate`
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .gzip(true)
            .deflate(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            cache,
            rate_limiter,
        })
    }

    /// Resolve a path against the origin; absolute URLs pass through.
    pub fn absolute_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// The cache store shared by this client
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// The rate limiter shared by this client
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Fetch a page body, from the cache when fresh.
    ///
    /// # Arguments
    /// * `path` - Relative path on metal-archives.com (e.g. "bands/_/125")
    ///   or an absolute URL
    ///
    /// # Errors
    /// - `MetallumError::Fetch` - Transport failure
    /// - `MetallumError::Status` - Non-success HTTP status
    /// - `MetallumError::NotFound` - Server returned 404
    /// - `MetallumError::Timeout` - Transport timeout elapsed
    pub async fn fetch(&self, path: &str) -> Result<String> {
        let url = self.absolute_url(path);

        if let Some(body) = self.cache.read(&url) {
            return Ok(body);
        }

        let flight = self.cache.join_flight(&url);
        let _held = flight.lock().await;

        // Another caller may have filled the cache while we waited
        if let Some(body) = self.cache.read(&url) {
            debug!("Coalesced fetch for {}", url);
            return Ok(body);
        }

        let body = self.fetch_live(&url).await?;
        if let Err(e) = self.cache.write(&url, &body) {
            warn!("Failed to cache {}: {}", url, e);
        }
        Ok(body)
    }

    /// Fetch a page body, giving up after `deadline`.
    ///
    /// Cancellation never leaves a partial cache entry behind.
    ///
    /// # Errors
    /// Same as [`fetch`](Self::fetch), plus `MetallumError::Timeout` when the
    /// deadline elapses.
    pub async fn fetch_with_deadline(&self, path: &str, deadline: Duration) -> Result<String> {
        match tokio::time::timeout(deadline, self.fetch(path)).await {
            Ok(result) => result,
            Err(_) => Err(MetallumError::Timeout {
                url: self.absolute_url(path),
            }),
        }
    }

    /// Perform one live GET, behind the rate limiter.
    async fn fetch_live(&self, url: &str) -> Result<String> {
        self.rate_limiter.acquire().await;

        debug!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| transport_error(url, source))?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MetallumError::NotFound(url.to_string()));
        }

        if !status.is_success() {
            warn!("HTTP {} for {}", status, url);
            return Err(MetallumError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| transport_error(url, source))?;
        info!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

fn transport_error(url: &str, source: reqwest::Error) -> MetallumError {
    if source.is_timeout() {
        MetallumError::Timeout {
            url: url.to_string(),
        }
    } else {
        MetallumError::Fetch {
            url: url.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer, temp: &TempDir) -> ClientConfig {
        ClientConfig {
            base_url: server.uri(),
            cache_dir: temp.path().to_path_buf(),
            request_interval: Duration::from_millis(10),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(2.0);
        assert_eq!(limiter.min_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_rate_limiter_different_rates() {
        let limiter = RateLimiter::new(1.0);
        assert_eq!(limiter.min_interval(), Duration::from_secs(1));

        let limiter = RateLimiter::with_interval(Duration::from_millis(250));
        assert_eq!(limiter.min_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "https://www.metal-archives.com");
        assert_eq!(config.request_interval, Duration::from_secs(1));
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert!(config.cache_dir.ends_with("metallum_cache"));
    }

    #[test]
    fn test_client_creation() {
        let client = MetallumClient::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_absolute_url() {
        let client = MetallumClient::new().unwrap();
        assert_eq!(
            client.absolute_url("bands/_/125"),
            "https://www.metal-archives.com/bands/_/125"
        );
        assert_eq!(
            client.absolute_url("/bands/_/125"),
            "https://www.metal-archives.com/bands/_/125"
        );
        assert_eq!(
            client.absolute_url("https://example.com/x"),
            "https://example.com/x"
        );
    }

    #[tokio::test]
    async fn test_rate_limiter_acquire() {
        let limiter = RateLimiter::new(10.0); // 10 requests per second = 100ms interval

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        let elapsed = start.elapsed();

        // Second acquire should wait at least 100ms
        assert!(elapsed >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_fetch_sends_ajax_headers() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/bands/_/125"))
            .and(header("x-requested-with", "XMLHttpRequest"))
            .and(header_exists("accept"))
            .and(header_exists("referer"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = MetallumClient::with_config(test_config(&server, &temp)).unwrap();
        let body = client.fetch("bands/_/125").await.unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_fetch_second_call_served_from_cache() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/albums/_/_/547"))
            .respond_with(ResponseTemplate::new(200).set_body_string("album page"))
            .expect(1)
            .mount(&server)
            .await;

        let client = MetallumClient::with_config(test_config(&server, &temp)).unwrap();
        let first = client.fetch("albums/_/_/547").await.unwrap();
        let second = client.fetch("albums/_/_/547").await.unwrap();
        assert_eq!(first, second);

        let url = client.absolute_url("albums/_/_/547");
        assert!(client.cache().entry_path(&url).exists());
    }

    #[tokio::test]
    async fn test_fetch_error_status_is_surfaced_and_not_cached() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/bands/_/1"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let client = MetallumClient::with_config(test_config(&server, &temp)).unwrap();
        for _ in 0..2 {
            match client.fetch("bands/_/1").await {
                Err(MetallumError::Status { url, status }) => {
                    assert_eq!(status, 503);
                    assert!(url.ends_with("/bands/_/1"));
                }
                other => panic!("Expected Status error, got {:?}", other),
            }
        }
        assert!(client.cache().read(&client.absolute_url("bands/_/1")).is_none());
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = MetallumClient::with_config(test_config(&server, &temp)).unwrap();
        let result = client.fetch("bands/_/999").await;
        assert!(matches!(result, Err(MetallumError::NotFound(url)) if url.ends_with("/bands/_/999")));
    }

    #[tokio::test]
    async fn test_concurrent_fetches_are_coalesced() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/bands/_/125"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Metallica")
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = MetallumClient::with_config(test_config(&server, &temp)).unwrap();
        let (a, b, c) = tokio::join!(
            client.fetch("bands/_/125"),
            client.fetch("bands/_/125"),
            client.fetch("/bands/_/125"),
        );
        assert_eq!(a.unwrap(), "Metallica");
        assert_eq!(b.unwrap(), "Metallica");
        assert_eq!(c.unwrap(), "Metallica");
        assert_eq!(client.cache().in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_with_deadline_times_out_cleanly() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/bands/_/125"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("slow")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = MetallumClient::with_config(test_config(&server, &temp)).unwrap();
        let result = client
            .fetch_with_deadline("bands/_/125", Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(MetallumError::Timeout { .. })));

        let url = client.absolute_url("bands/_/125");
        assert!(!client.cache().entry_path(&url).exists());
        assert_eq!(client.cache().in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_clients_share_cache_and_limiter() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/bands/_/125"))
            .respond_with(ResponseTemplate::new(200).set_body_string("shared"))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(&server, &temp);
        let cache = Arc::new(CacheStore::new(temp.path(), DEFAULT_CACHE_TTL));
        let limiter = Arc::new(RateLimiter::with_interval(Duration::from_millis(10)));
        let first =
            MetallumClient::with_parts(config.clone(), cache.clone(), limiter.clone()).unwrap();
        let second = MetallumClient::with_parts(config, cache, limiter).unwrap();

        assert_eq!(first.fetch("bands/_/125").await.unwrap(), "shared");
        assert_eq!(second.fetch("bands/_/125").await.unwrap(), "shared");
        assert!(Arc::ptr_eq(first.rate_limiter(), second.rate_limiter()));
    }

    #[tokio::test]
    async fn test_clients_sharing_a_cache_coalesce_fetches() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/bands/_/125"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Metallica")
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(&server, &temp);
        let cache = Arc::new(CacheStore::new(temp.path(), DEFAULT_CACHE_TTL));
        let limiter = Arc::new(RateLimiter::with_interval(Duration::from_millis(10)));
        let first =
            MetallumClient::with_parts(config.clone(), cache.clone(), limiter.clone()).unwrap();
        let second = MetallumClient::with_parts(config, cache.clone(), limiter).unwrap();

        let (a, b) = tokio::join!(first.fetch("bands/_/125"), second.fetch("bands/_/125"));
        assert_eq!(a.unwrap(), "Metallica");
        assert_eq!(b.unwrap(), "Metallica");
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_hits_skip_the_rate_limiter() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/albums/_/_/547"))
            .respond_with(ResponseTemplate::new(200).set_body_string("album page"))
            .expect(1)
            .mount(&server)
            .await;

        let config = ClientConfig {
            request_interval: Duration::from_millis(500),
            ..test_config(&server, &temp)
        };
        let client = MetallumClient::with_config(config).unwrap();
        client.fetch("albums/_/_/547").await.unwrap();

        let start = Instant::now();
        client.fetch("albums/_/_/547").await.unwrap();
        client.fetch("albums/_/_/547").await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(250));
    }
}
