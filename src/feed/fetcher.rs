use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use super::normalize::RawFeedItem;
use super::parser::parse_feed;
use crate::config::Config;
use crate::util::{UrlPolicy, UrlValidationError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Errors that can occur while retrieving and parsing a feed document.
///
/// Any of these abandons the whole batch for that source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The feed URL was refused before a request was made
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Document could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Retrieves a feed document and turns it into raw items.
///
/// The ingestion pipeline only depends on this trait; [`HttpTransport`] is the
/// production implementation.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<RawFeedItem>, FetchError>;
}

/// HTTP transport with timeout, bounded retries and a body size cap.
///
/// - HTTP 429 and 5xx responses are retried with exponential backoff
///   (base, 2×base, 4×base) up to `max_retries` times
/// - bodies shorter than their Content-Length are retried the same way
/// - other 4xx responses fail immediately
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    max_feed_size: usize,
    backoff: Duration,
    url_policy: UrlPolicy,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            max_feed_size: DEFAULT_MAX_FEED_SIZE,
            backoff: DEFAULT_BACKOFF,
            url_policy: UrlPolicy::default(),
        }
    }

    /// Build a transport (and its client) from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self::new(client)
            .with_timeout(Duration::from_secs(config.request_timeout_secs))
            .with_max_retries(config.max_retries)
            .with_max_feed_size(config.max_feed_bytes)
            .with_url_policy(UrlPolicy {
                allow_private_hosts: config.allow_private_hosts,
            }))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_feed_size(mut self, max_feed_size: usize) -> Self {
        self.max_feed_size = max_feed_size;
        self
    }

    /// Base delay of the exponential backoff.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_url_policy(mut self, url_policy: UrlPolicy) -> Self {
        self.url_policy = url_policy;
        self
    }

    fn delay(&self, retry_count: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(retry_count))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.url_policy.validate(url)?;
        let mut retry_count = 0;

        loop {
            let response = tokio::time::timeout(self.timeout, self.client.get(url.clone()).send())
                .await
                .map_err(|_| FetchError::Timeout)?
                .map_err(FetchError::Network)?;
            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if retry_count >= self.max_retries {
                    return Err(FetchError::RateLimited(self.max_retries));
                }
                let delay = self.delay(retry_count);
                tracing::warn!(
                    feed = %url,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if status.is_server_error() {
                if retry_count >= self.max_retries {
                    return Err(FetchError::HttpStatus(status.as_u16()));
                }
                let delay = self.delay(retry_count);
                tracing::warn!(
                    feed = %url,
                    status = %status,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Server error, retrying after delay"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            match read_limited_bytes(response, self.max_feed_size).await {
                Ok(bytes) => return Ok(bytes),
                Err(FetchError::IncompleteResponse { expected, received }) => {
                    if retry_count >= self.max_retries {
                        return Err(FetchError::IncompleteResponse { expected, received });
                    }
                    let delay = self.delay(retry_count);
                    tracing::debug!(
                        feed = %url,
                        expected = expected,
                        received = received,
                        attempt = retry_count + 1,
                        "Retrying incomplete download"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl FeedTransport for HttpTransport {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<RawFeedItem>, FetchError> {
        let bytes = self.download(url).await?;
        let items = parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;
        tracing::debug!(feed = %url, bytes = bytes.len(), items = items.len(), "Feed parsed");
        Ok(items)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><guid>1</guid><title>Test</title><link>https://example.com/1</link></item>
</channel></rss>"#;

    fn transport() -> HttpTransport {
        HttpTransport::new(reqwest::Client::new())
            .with_backoff(Duration::from_millis(10))
            .with_url_policy(UrlPolicy::permissive())
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&mock_server)
            .await;

        let items = transport()
            .fetch_feed(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].guid.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = transport()
            .fetch_feed(&format!("{}/feed", mock_server.uri()))
            .await;
        match result {
            Err(FetchError::HttpStatus(404)) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_500_retries_then_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4) // Initial request + 3 retries
            .mount(&mock_server)
            .await;

        let result = transport()
            .fetch_feed(&format!("{}/feed", mock_server.uri()))
            .await;
        match result {
            Err(FetchError::HttpStatus(500)) => {}
            other => panic!("Expected HttpStatus(500), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_503_retry_then_success() {
        let mock_server = MockServer::start().await;

        // First two requests return 503, third succeeds
        Mock::given(any())
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;

        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let items = transport()
            .fetch_feed(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_rate_limited() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&mock_server)
            .await;

        let result = transport()
            .with_max_retries(1)
            .fetch_feed(&format!("{}/feed", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::RateLimited(1))));
    }

    #[tokio::test]
    async fn test_malformed_feed_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .mount(&mock_server)
            .await;

        let result = transport()
            .fetch_feed(&format!("{}/feed", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_response_too_large() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let result = transport()
            .with_max_feed_size(16)
            .fetch_feed(&format!("{}/feed", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::ResponseTooLarge)));
    }

    #[tokio::test]
    async fn test_empty_feed_success() {
        let empty_rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel></channel></rss>"#;

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(empty_rss))
            .mount(&mock_server)
            .await;

        let items = transport()
            .fetch_feed(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_private_host_refused_by_default_policy() {
        let result = HttpTransport::new(reqwest::Client::new())
            .fetch_feed("http://127.0.0.1:9/feed")
            .await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }
}
