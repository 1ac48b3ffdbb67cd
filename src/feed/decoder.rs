use feed_rs::model::{Entry, Feed, Link};
use feed_rs::parser;
use thiserror::Error;

use crate::feed::types::{ChannelMeta, DecodedFeed, RawItem};

/// The payload could not be decoded as an RSS/Atom/JSON feed.
#[derive(Debug, Error)]
#[error("Parse error: {0}")]
pub struct DecodeError(pub String);

/// Converts raw response bytes into channel metadata and ordered items.
///
/// Implementations must be pure with respect to the input so that a fetch
/// task can run them from any worker.
pub trait FeedDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedFeed, DecodeError>;
}

/// [`FeedDecoder`] backed by the `feed-rs` parser (RSS 0.9–2.0, Atom, JSON Feed).
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedRsDecoder;

impl FeedDecoder for FeedRsDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedFeed, DecodeError> {
        let feed = parser::parse(bytes).map_err(|e| DecodeError(e.to_string()))?;
        Ok(convert_feed(feed))
    }
}

fn convert_feed(feed: Feed) -> DecodedFeed {
    let channel = ChannelMeta {
        title: feed.title.map(|t| t.content).unwrap_or_default(),
        link: primary_link(&feed.links).unwrap_or_default(),
        image_url: feed
            .logo
            .or(feed.icon)
            .map(|image| image.uri)
            .filter(|uri| !uri.is_empty()),
    };

    let items = feed.entries.into_iter().map(convert_entry).collect();

    DecodedFeed { channel, items }
}

fn convert_entry(entry: Entry) -> RawItem {
    let link = primary_link(&entry.links).unwrap_or_default();
    let published = entry.published.or(entry.updated);
    let description = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .unwrap_or_default();
    let title = entry.title.map(|t| t.content).unwrap_or_default();
    let categories = entry.categories.into_iter().map(|c| c.term).collect();

    // Enclosures and media:content land in `content`, media:thumbnail in `thumbnails`
    let mut image_url = None;
    let mut extension_images = Vec::new();
    for media in &entry.media {
        if image_url.is_none() {
            image_url = media
                .content
                .iter()
                .filter(|c| {
                    c.content_type
                        .as_ref()
                        .is_some_and(|ct| ct.to_string().starts_with("image/"))
                })
                .find_map(|c| c.url.as_ref().map(|u| u.to_string()));
        }
        extension_images.extend(
            media
                .thumbnails
                .iter()
                .map(|t| t.image.uri.clone())
                .filter(|uri| !uri.is_empty()),
        );
    }

    RawItem {
        title,
        link,
        description,
        categories,
        published,
        image_url,
        extension_images,
    }
}

/// First `alternate` (or rel-less) link, else the first link of any kind.
fn primary_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(|l| l.href.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
<channel>
    <title>Example Channel</title>
    <link>https://example.com</link>
    <image><url>/logo.png</url><title>Example</title><link>https://example.com</link></image>
    <item>
        <title>First &amp; foremost</title>
        <link>/posts/1</link>
        <description>Body one</description>
        <category>rust</category>
        <category>async</category>
        <pubDate>Tue, 10 Jun 2025 04:00:00 GMT</pubDate>
        <media:thumbnail url="https://cdn.example.com/thumb1.jpg"/>
    </item>
    <item>
        <title>Second</title>
        <link>https://example.com/posts/2</link>
        <enclosure url="https://cdn.example.com/two.png" type="image/png" length="100"/>
    </item>
</channel>
</rss>"#;

    #[test]
    fn test_decode_rss_channel_metadata() {
        let decoded = FeedRsDecoder.decode(RSS.as_bytes()).unwrap();
        assert_eq!(decoded.channel.title, "Example Channel");
        assert!(decoded.channel.link.starts_with("https://example.com"));
        assert_eq!(decoded.channel.image_url.as_deref(), Some("/logo.png"));
    }

    #[test]
    fn test_decode_rss_items_in_document_order() {
        let decoded = FeedRsDecoder.decode(RSS.as_bytes()).unwrap();
        assert_eq!(decoded.items.len(), 2);

        let first = &decoded.items[0];
        assert_eq!(first.title, "First & foremost");
        assert_eq!(first.description, "Body one");
        assert_eq!(first.categories, vec!["rust", "async"]);
        assert_eq!(
            first.published,
            Some(Utc.with_ymd_and_hms(2025, 6, 10, 4, 0, 0).unwrap())
        );
        assert_eq!(
            first.extension_images,
            vec!["https://cdn.example.com/thumb1.jpg".to_string()]
        );

        let second = &decoded.items[1];
        assert_eq!(second.link, "https://example.com/posts/2");
        assert_eq!(second.published, None);
        assert_eq!(
            second.image_url.as_deref(),
            Some("https://cdn.example.com/two.png")
        );
    }

    #[test]
    fn test_decode_atom_prefers_alternate_link() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>Atom Channel</title>
    <id>urn:example</id>
    <updated>2025-01-01T00:00:00Z</updated>
    <link rel="self" href="https://example.org/feed.xml"/>
    <link rel="alternate" href="https://example.org/"/>
    <entry>
        <title>Entry</title>
        <id>urn:entry:1</id>
        <updated>2025-01-02T00:00:00Z</updated>
        <link rel="alternate" href="https://example.org/entry"/>
        <summary>Summary text</summary>
    </entry>
</feed>"#;

        let decoded = FeedRsDecoder.decode(atom.as_bytes()).unwrap();
        assert_eq!(decoded.channel.link, "https://example.org/");
        assert_eq!(decoded.items[0].link, "https://example.org/entry");
        assert_eq!(decoded.items[0].description, "Summary text");
        // Atom entries without <published> fall back to <updated>
        assert_eq!(
            decoded.items[0].published,
            Some(Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_decode_malformed_input_fails() {
        let result = FeedRsDecoder.decode(b"<not valid xml");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Parse error"));
    }
}
