use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use thiserror::Error;

use crate::feed::SourceDescriptor;
use crate::sources::UrlPolicy;

/// Maximum allowed nesting depth for OPML outline elements.
const MAX_OPML_DEPTH: usize = 50;

#[derive(Debug, Error)]
pub enum OpmlError {
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("Failed to read OPML file: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads an OPML subscription list and turns every feed outline into a
/// [`SourceDescriptor`].
pub async fn load(path: &Path, policy: UrlPolicy) -> Result<Vec<SourceDescriptor>, OpmlError> {
    let content = tokio::fs::read_to_string(path).await?;
    let sources = parse(&content, policy)?;
    tracing::debug!(path = %path.display(), sources = sources.len(), "Loaded OPML sources");
    Ok(sources)
}

/// Parses OPML text into source descriptors, in document order.
///
/// Any `<outline>` carrying `xmlUrl` is a feed, at any depth; folder
/// outlines are walked but not returned. The descriptor title comes from
/// `title`, then `text`; when neither is present the channel's own title is
/// used at fetch time. Outlines whose URL fails `policy` are skipped with a
/// warning.
///
/// quick-xml (0.37) never expands `<!ENTITY>` declarations; unknown
/// entity references surface as errors from `decode_and_unescape_value`.
pub fn parse(content: &str, policy: UrlPolicy) -> Result<Vec<SourceDescriptor>, OpmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut sources = Vec::new();
    let mut buf = Vec::new();
    let mut depth: usize = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                depth += 1;
                if depth > MAX_OPML_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                }
                if let Some(source) = outline_source(&e, &reader, policy)? {
                    sources.push(source);
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                if let Some(source) = outline_source(&e, &reader, policy)? {
                    sources.push(source);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(sources)
}

fn outline_source(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    policy: UrlPolicy,
) -> Result<Option<SourceDescriptor>, OpmlError> {
    let mut xml_url = None;
    let mut title = None;
    let mut text = None;

    for attr in e.attributes() {
        let attr = match attr {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed OPML attribute");
                continue;
            }
        };

        let slot = match attr.key.as_ref() {
            b"xmlUrl" => &mut xml_url,
            b"title" => &mut title,
            b"text" => &mut text,
            _ => continue,
        };
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| OpmlError::XmlParse(e.to_string()))?;
        *slot = Some(value.into_owned());
    }

    let Some(url) = xml_url.filter(|u| !u.trim().is_empty()) else {
        return Ok(None);
    };

    if let Err(e) = policy.check(&url) {
        tracing::warn!(url = %url, error = %e, "Skipping invalid feed URL");
        return Ok(None);
    }

    let mut source = SourceDescriptor::new(url);
    source.title = title.or(text).filter(|t| !t.is_empty());
    Ok(Some(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="2.0">
  <head><title>Subscriptions</title></head>
  <body>
    <outline text="Blogs" title="Blogs">
      <outline type="rss" text="Example Blog" title="Example Blog" xmlUrl="https://example.com/feed.xml" htmlUrl="https://example.com"/>
      <outline type="rss" text="Text Only" xmlUrl="https://textonly.com/rss"/>
    </outline>
    <outline type="rss" xmlUrl="https://notitle.com/feed"/>
  </body>
</opml>"#;

    #[test]
    fn test_parse_nested_outlines_in_order() {
        let sources = parse(NESTED, UrlPolicy::PublicOnly).unwrap();
        let urls: Vec<&str> = sources.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/feed.xml",
                "https://textonly.com/rss",
                "https://notitle.com/feed"
            ]
        );
    }

    #[test]
    fn test_title_then_text_then_channel() {
        let sources = parse(NESTED, UrlPolicy::PublicOnly).unwrap();
        assert_eq!(sources[0].title.as_deref(), Some("Example Blog"));
        assert_eq!(sources[1].title.as_deref(), Some("Text Only"));
        assert_eq!(sources[2].title, None);
    }

    #[test]
    fn test_private_and_local_urls_skipped() {
        let content = r#"<?xml version="1.0"?>
    <opml version="2.0"><body>
        <outline xmlUrl="https://valid.com/feed"/>
        <outline xmlUrl="http://192.168.1.1/feed"/>
        <outline xmlUrl="http://localhost/feed"/>
        <outline xmlUrl="file:///etc/passwd"/>
    </body></opml>"#;

        let sources = parse(content, UrlPolicy::PublicOnly).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].url, "https://valid.com/feed");

        let sources = parse(content, UrlPolicy::AllowPrivate).unwrap();
        assert_eq!(sources.len(), 3);
    }

    #[test]
    fn test_empty_opml() {
        let content = r#"<?xml version="1.0"?><opml version="2.0"><body></body></opml>"#;
        assert!(parse(content, UrlPolicy::PublicOnly).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_xml_error() {
        assert!(parse("<not valid xml", UrlPolicy::PublicOnly).is_err());
    }

    #[test]
    fn test_external_entity_not_expanded() {
        let malicious = r#"<?xml version="1.0"?>
<!DOCTYPE opml [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<opml version="2.0">
    <body>
        <outline text="&xxe;" xmlUrl="https://example.com/feed.xml"/>
    </body>
</opml>"#;

        match parse(malicious, UrlPolicy::PublicOnly) {
            Ok(sources) => {
                for source in &sources {
                    let title = source.title.as_deref().unwrap_or_default();
                    assert!(!title.contains("root:"), "entity must not expand");
                }
            }
            Err(e) => assert!(matches!(e, OpmlError::XmlParse(_))),
        }
    }

    #[test]
    fn test_deeply_nested_opml_rejected() {
        let mut opml = String::from(r#"<?xml version="1.0"?><opml version="2.0"><body>"#);
        opml.push_str(&r#"<outline text="level">"#.repeat(100));
        opml.push_str(&"</outline>".repeat(100));
        opml.push_str("</body></opml>");

        let err = parse(&opml, UrlPolicy::PublicOnly).unwrap_err();
        assert!(matches!(err, OpmlError::MaxDepthExceeded(50)));
    }

    #[test]
    fn test_nesting_at_depth_limit_allowed() {
        let mut opml = String::from(r#"<?xml version="1.0"?><opml version="2.0"><body>"#);
        opml.push_str(&r#"<outline text="level">"#.repeat(50));
        opml.push_str(r#"<outline text="Deep Feed" xmlUrl="https://deep.example.com/feed"/>"#);
        opml.push_str(&"</outline>".repeat(50));
        opml.push_str("</body></opml>");

        let sources = parse(&opml, UrlPolicy::PublicOnly).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].title.as_deref(), Some("Deep Feed"));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let result = load(Path::new("/nonexistent/feedfold/feeds.opml"), UrlPolicy::PublicOnly).await;
        assert!(matches!(result, Err(OpmlError::Io(_))));
    }
}
