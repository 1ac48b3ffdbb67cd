//! Shared helpers for text shortening and URL handling.
//!
//! - **Text**: description sanitizing and word-boundary shortening
//! - **URLs**: source URL validation (SSRF) and link-joining helpers used
//!   by the item normalizer

mod text;
mod url;

pub use self::text::{sanitize_description, shorten, shorten_description, unescape_html, ELLIPSIS};
pub use self::url::{
    is_absolute_http, join_with_slash, parse_http_url, site_origin, validate_source_url,
    UrlValidationError,
};
