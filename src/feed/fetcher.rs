use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use reqwest::header::{HeaderName, HeaderValue, USER_AGENT};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::feed::decoder::{DecodeError, FeedDecoder, FeedRsDecoder};
use crate::feed::normalize::normalize;
use crate::feed::types::{FeedItem, SourceDescriptor};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
pub const DEFAULT_USER_AGENT: &str = concat!(
    "feedfold/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/feedfold/feedfold)"
);

/// Errors from fetching a single source.
///
/// A source either yields all of its items or one of these; there is no
/// partial success within a source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be built (bad URL, bad header name/value)
    #[error("Invalid request: {0}")]
    Request(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[source] reqwest::Error),
    /// Sending the request or reading the body exceeded the timeout
    #[error("Request timed out")]
    Timeout,
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// The body stream failed part way
    #[error("Failed to read response body: {0}")]
    Read(#[source] reqwest::Error),
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Feed payload could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Fetch-and-normalize for one source.
///
/// This is the unit of work the aggregator fans out; implementations must
/// not share mutable state between concurrent calls.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<FeedItem>, FetchError>;
}

/// [`SourceFetcher`] that performs one HTTP GET per source.
///
/// The client, user agent, decoder and limits are all explicit so tests can
/// point it at a mock server and swap the decoder.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    decoder: Arc<dyn FeedDecoder>,
    user_agent: String,
    timeout: Duration,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            decoder: Arc::new(FeedRsDecoder),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_body_bytes: MAX_FEED_SIZE,
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn FeedDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Applies separately to sending the request and to reading the body.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Fetches, decodes and normalizes one source.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Request`] - URL or header could not be turned into a request
    /// - [`FetchError::Network`] / [`FetchError::Timeout`] - transport failure
    /// - [`FetchError::HttpStatus`] - non-2xx response
    /// - [`FetchError::Read`], [`FetchError::IncompleteResponse`],
    ///   [`FetchError::ResponseTooLarge`] - body could not be read in full
    /// - [`FetchError::Decode`] - body is not a feed
    pub async fn fetch_source(
        &self,
        source: &SourceDescriptor,
    ) -> Result<Vec<FeedItem>, FetchError> {
        let request = self.build_request(source)?;

        let response = tokio::time::timeout(self.timeout, self.client.execute(request))
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let bytes = tokio::time::timeout(
            self.timeout,
            read_limited_bytes(response, self.max_body_bytes),
        )
        .await
        .map_err(|_| FetchError::Timeout)??;

        let fetched_at = Utc::now();
        let mut decoded = self.decoder.decode(&bytes)?;

        if source.limit > 0 {
            decoded.items.truncate(source.limit);
        }

        let items: Vec<FeedItem> = decoded
            .items
            .iter()
            .map(|raw| normalize(raw, &decoded.channel, source, fetched_at))
            .collect();

        tracing::debug!(
            feed = %source.url,
            items = items.len(),
            bytes = bytes.len(),
            "Fetched feed"
        );

        Ok(items)
    }

    fn build_request(&self, source: &SourceDescriptor) -> Result<reqwest::Request, FetchError> {
        let mut request = self
            .client
            .get(&source.url)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let headers = request.headers_mut();
        let agent = HeaderValue::from_str(&self.user_agent)
            .map_err(|e| FetchError::Request(format!("user agent: {e}")))?;
        headers.insert(USER_AGENT, agent);

        // Source headers go last so they can replace the user agent
        for (name, value) in &source.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::Request(format!("header {name}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| FetchError::Request(format!("header {name}: {e}")))?;
            headers.insert(header_name, header_value);
        }

        Ok(request)
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<FeedItem>, FetchError> {
        self.fetch_source(source).await
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
        let chunk = match chunk {
            Ok(chunk) => chunk,
            // A body cut short of its Content-Length surfaces as a stream error
            Err(e) => {
                return Err(match expected_length {
                    Some(expected) if (bytes.len() as u64) < expected => {
                        FetchError::IncompleteResponse {
                            expected,
                            received: bytes.len(),
                        }
                    }
                    _ => FetchError::Read(e),
                });
            }
        };
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
