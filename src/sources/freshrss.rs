//! Source discovery through a FreshRSS instance's Fever-compatible API.
//!
//! One authenticated POST returns the user's subscriptions; each becomes a
//! [`SourceDescriptor`] that the aggregator then fetches directly.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::feed::{SourceDescriptor, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};

#[derive(Debug, Error)]
pub enum FreshRssError {
    #[error("could not create FreshRSS request: {0}")]
    Request(String),
    #[error("could not connect to FreshRSS instance: {0}")]
    Connect(#[source] reqwest::Error),
    #[error("FreshRSS request timed out")]
    Timeout,
    #[error("FreshRSS returned status {0}")]
    HttpStatus(u16),
    #[error("could not read FreshRSS response body: {0}")]
    Read(#[source] reqwest::Error),
    #[error("could not decode FreshRSS response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("FreshRSS rejected the API credentials")]
    Unauthorized,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FeverFeed {
    title: String,
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FeverFeedsResponse {
    auth: u8,
    feeds: Vec<FeverFeed>,
}

/// Client for the `api/fever.php` endpoint of a FreshRSS instance.
pub struct FreshRssClient {
    client: reqwest::Client,
    base_url: String,
    user: String,
    api_pass: SecretString,
    user_agent: String,
    timeout: Duration,
}

impl FreshRssClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        user: impl Into<String>,
        api_pass: SecretString,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            user: user.into(),
            api_pass,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fever API key: lowercase hex MD5 of `user:password`.
    fn api_key(&self) -> String {
        let credentials = format!("{}:{}", self.user, self.api_pass.expose_secret());
        format!("{:x}", md5::compute(credentials.as_bytes()))
    }

    /// Lists the subscribed feeds as source descriptors, in API order.
    pub async fn discover(&self) -> Result<Vec<SourceDescriptor>, FreshRssError> {
        let endpoint = format!("{}/api/fever.php?api", self.base_url.trim_end_matches('/'));
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("api_key", &self.api_key())
            .append_pair("feeds", "")
            .finish();

        let request = self
            .client
            .post(&endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(reqwest::header::USER_AGENT, self.user_agent.as_str())
            .body(body)
            .build()
            .map_err(|e| FreshRssError::Request(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.execute(request))
            .await
            .map_err(|_| FreshRssError::Timeout)?
            .map_err(FreshRssError::Connect)?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(FreshRssError::HttpStatus(response.status().as_u16()));
        }

        let bytes = tokio::time::timeout(self.timeout, response.bytes())
            .await
            .map_err(|_| FreshRssError::Timeout)?
            .map_err(FreshRssError::Read)?;

        let parsed: FeverFeedsResponse = serde_json::from_slice(&bytes)?;
        if parsed.auth != 1 {
            return Err(FreshRssError::Unauthorized);
        }

        let sources: Vec<SourceDescriptor> = parsed
            .feeds
            .into_iter()
            .filter(|f| !f.url.is_empty())
            .map(|f| {
                let mut source = SourceDescriptor::new(f.url);
                source.title = Some(f.title).filter(|t| !t.is_empty());
                source
            })
            .collect();

        tracing::info!(
            instance = %self.base_url,
            feeds = sources.len(),
            "Discovered FreshRSS subscriptions"
        );

        Ok(sources)
    }
}
