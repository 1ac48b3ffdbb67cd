use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Source Descriptor
// ============================================================================

/// One feed to fetch, plus the per-source options that shape its items.
///
/// Descriptors come from source discovery (config file, OPML, FreshRSS) and
/// are treated as immutable for the duration of one aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceDescriptor {
    /// URL of the RSS/Atom document.
    pub url: String,
    /// Overrides the channel title as the item's channel name.
    pub title: Option<String>,
    /// Prepended verbatim to every item link when set.
    pub item_link_prefix: Option<String>,
    /// Keep only the first N decoded items (0 = unlimited).
    pub limit: usize,
    pub hide_description: bool,
    pub hide_categories: bool,
    /// Extra request headers; these override the default `User-Agent`.
    pub headers: BTreeMap<String, String>,
}

impl SourceDescriptor {
    /// Descriptor for `url` with every option at its default.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Sets the display title used as the channel name.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

// ============================================================================
// Canonical Item
// ============================================================================

/// A normalized feed entry, the unit of the aggregated output.
///
/// `link` is the deduplication key across sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    pub link: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub channel_name: String,
    pub channel_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    pub published_at: DateTime<Utc>,
}

// ============================================================================
// Decoded Feed (decoder output)
// ============================================================================

/// Channel-level metadata reported by the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMeta {
    pub title: String,
    pub link: String,
    pub image_url: Option<String>,
}

/// One item as decoded, before normalization.
///
/// Strings are raw feed text: possibly empty, possibly relative, possibly
/// containing HTML markup or entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub categories: Vec<String>,
    pub published: Option<DateTime<Utc>>,
    /// Image attached to the item itself (image enclosure / media content).
    pub image_url: Option<String>,
    /// Images found in feed extensions such as `media:thumbnail`.
    pub extension_images: Vec<String>,
}

/// Decoder output: channel metadata plus items in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedFeed {
    pub channel: ChannelMeta,
    pub items: Vec<RawItem>,
}
