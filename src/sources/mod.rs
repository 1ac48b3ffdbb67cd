//! Where source descriptors come from.
//!
//! Static `[[sources]]` entries, an OPML subscription list, and a FreshRSS
//! instance all produce plain [`SourceDescriptor`]s. [`discover`] stitches
//! them together in that order.

pub mod freshrss;
pub mod opml;

use secrecy::SecretString;
use thiserror::Error;

use crate::config::Config;
use crate::feed::SourceDescriptor;
use crate::util::{parse_http_url, validate_source_url, UrlValidationError};

pub use freshrss::{FreshRssClient, FreshRssError};
pub use opml::OpmlError;

/// Whether source URLs pointing at private or loopback hosts are accepted.
///
/// Both policies require a parseable `http`/`https` URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlPolicy {
    PublicOnly,
    AllowPrivate,
}

impl UrlPolicy {
    pub fn from_allow_private(allow: bool) -> Self {
        if allow {
            Self::AllowPrivate
        } else {
            Self::PublicOnly
        }
    }

    pub fn check(&self, url: &str) -> Result<(), UrlValidationError> {
        match self {
            Self::AllowPrivate => parse_http_url(url).map(|_| ()),
            Self::PublicOnly => validate_source_url(url).map(|_| ()),
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to load OPML subscriptions: {0}")]
    Opml(#[from] OpmlError),
    #[error("failed to discover FreshRSS subscriptions: {0}")]
    FreshRss(#[from] FreshRssError),
}

/// Drops static descriptors whose URL the policy rejects, keeping order.
pub fn checked(sources: &[SourceDescriptor], policy: UrlPolicy) -> Vec<SourceDescriptor> {
    sources
        .iter()
        .filter(|source| match policy.check(&source.url) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(url = %source.url, error = %e, "Skipping configured source");
                false
            }
        })
        .cloned()
        .collect()
}

/// Collects every configured source: static entries, then OPML, then FreshRSS.
///
/// Any provider failing aborts discovery.
pub async fn discover(
    config: &Config,
    client: &reqwest::Client,
) -> Result<Vec<SourceDescriptor>, SourceError> {
    let policy = UrlPolicy::from_allow_private(config.allow_private_hosts);
    let mut sources = checked(&config.sources, policy);

    if let Some(path) = &config.opml {
        sources.extend(opml::load(path, policy).await?);
    }

    if let Some(fresh) = &config.freshrss {
        let client = FreshRssClient::new(
            client.clone(),
            fresh.url.clone(),
            fresh.user.clone(),
            SecretString::from(fresh.api_pass.clone()),
        )
        .with_user_agent(config.user_agent())
        .with_timeout(config.request_timeout());
        sources.extend(client.discover().await?);
    }

    Ok(sources)
}
