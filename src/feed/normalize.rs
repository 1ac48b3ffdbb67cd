use chrono::{DateTime, Utc};

use crate::feed::types::{ChannelMeta, FeedItem, RawItem, SourceDescriptor};
use crate::util::{
    is_absolute_http, join_with_slash, shorten_description, site_origin, unescape_html,
};

/// Budget for a title synthesized from the description.
pub const TITLE_FALLBACK_LEN: usize = 100;
/// Budget for the description carried on an item.
pub const DESCRIPTION_LEN: usize = 200;
pub const MAX_CATEGORIES: usize = 6;
pub const MAX_CATEGORY_LEN: usize = 30;

/// Maps one decoded item into a [`FeedItem`].
///
/// Never fails: every field has a fallback. `fetched_at` stamps items whose
/// feed carries no publish date, so undated items sort as the freshest.
pub fn normalize(
    raw: &RawItem,
    channel: &ChannelMeta,
    source: &SourceDescriptor,
    fetched_at: DateTime<Utc>,
) -> FeedItem {
    let title = if raw.title.is_empty() {
        shorten_description(&raw.description, TITLE_FALLBACK_LEN)
    } else {
        unescape_html(&raw.title).into_owned()
    };

    let description = (!source.hide_description
        && !raw.title.is_empty()
        && !raw.description.is_empty())
    .then(|| shorten_description(&raw.description, DESCRIPTION_LEN));

    let categories = if source.hide_categories {
        Vec::new()
    } else {
        filter_categories(&raw.categories)
    };

    let channel_name = source
        .title
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| channel.title.clone());

    FeedItem {
        link: resolve_link(&raw.link, channel, source),
        title,
        description,
        channel_name,
        channel_url: channel.link.clone(),
        image_url: resolve_image(raw, channel),
        categories,
        published_at: raw.published.unwrap_or(fetched_at),
    }
}

/// Resolves an item link to an absolute URL.
///
/// Priority: configured prefix, already-absolute link, then the link as a
/// path on the channel's site (or the source URL's site when the channel
/// link is unusable). A link that cannot be anchored anywhere is kept as-is.
pub fn resolve_link(link: &str, channel: &ChannelMeta, source: &SourceDescriptor) -> String {
    if let Some(prefix) = source.item_link_prefix.as_deref().filter(|p| !p.is_empty()) {
        return format!("{prefix}{link}");
    }

    if is_absolute_http(link) {
        return link.to_owned();
    }

    let Some(origin) = site_origin(&channel.link).or_else(|| site_origin(&source.url)) else {
        return link.to_owned();
    };

    if link.starts_with('/') {
        format!("{origin}{link}")
    } else {
        format!("{origin}/{link}")
    }
}

/// Item image, then extension thumbnail, then the channel image.
fn resolve_image(raw: &RawItem, channel: &ChannelMeta) -> Option<String> {
    if let Some(url) = raw.image_url.as_deref().filter(|u| !u.is_empty()) {
        return Some(url.to_owned());
    }

    if let Some(url) = raw.extension_images.iter().find(|u| !u.is_empty()) {
        return Some(url.clone());
    }

    let image = channel.image_url.as_deref().filter(|u| !u.is_empty())?;
    if url::Url::parse(image).is_ok() || channel.link.is_empty() {
        Some(image.to_owned())
    } else {
        Some(join_with_slash(&channel.link, image))
    }
}

/// First [`MAX_CATEGORIES`] categories that are non-empty and at most
/// [`MAX_CATEGORY_LEN`] characters, in feed order.
pub fn filter_categories(categories: &[String]) -> Vec<String> {
    categories
        .iter()
        .filter(|c| !c.is_empty() && c.chars().count() <= MAX_CATEGORY_LEN)
        .take(MAX_CATEGORIES)
        .cloned()
        .collect()
}
