use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors from validating a configured or discovered source URL.
///
/// The policy rejects anything that would let a feed list point the
/// aggregator at the host it runs on or at its private network.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    #[error("Localhost not allowed")]
    Localhost,
}

/// Parses `raw` and requires an `http`/`https` scheme. Hosts are not checked.
pub fn parse_http_url(raw: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(raw)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlValidationError::UnsupportedScheme(url.scheme().to_owned()));
    }

    Ok(url)
}

/// Validates a source URL before it is handed to the aggregator.
///
/// Accepts only `http`/`https` URLs whose host is neither `localhost`,
/// a loopback address, nor a private/link-local/unspecified address.
///
/// ```
/// use feedfold::util::validate_source_url;
///
/// assert!(validate_source_url("https://example.com/feed.xml").is_ok());
/// assert!(validate_source_url("http://localhost/feed").is_err());
/// assert!(validate_source_url("http://192.168.1.1/feed").is_err());
/// assert!(validate_source_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_source_url(raw: &str) -> Result<Url, UrlValidationError> {
    let url = parse_http_url(raw)?;

    let Some(host) = url.host_str() else {
        return Ok(url);
    };

    if host.eq_ignore_ascii_case("localhost") {
        return Err(UrlValidationError::Localhost);
    }

    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    match bare.parse::<IpAddr>() {
        Ok(ip) if ip.is_loopback() => Err(UrlValidationError::Localhost),
        Ok(ip) if is_private_ip(&ip) => Err(UrlValidationError::PrivateIp(ip.to_string())),
        _ => Ok(url),
    }
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local fc00::/7
                || (first & 0xffc0) == 0xfe80 // link local fe80::/10
        }
    }
}

/// True for links that already carry an `http://` or `https://` scheme.
pub fn is_absolute_http(link: &str) -> bool {
    link.starts_with("http://") || link.starts_with("https://")
}

/// `scheme://host[:port]` of `raw`, or `None` when it does not parse or has
/// no host to anchor a path on.
pub fn site_origin(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    url.host_str()?;

    let origin = url.origin();
    origin
        .is_tuple()
        .then(|| origin.ascii_serialization())
}

/// Joins `base` and `path` with exactly one `/` between them.
pub fn join_with_slash(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
