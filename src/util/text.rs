use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

/// Truncation marker appended by [`shorten`]. One character wide.
pub const ELLIPSIS: &str = "…";
const ELLIPSIS_LEN: usize = 1;

/// Upper bound on how much raw description text is sanitized at all.
const SANITIZE_INPUT_CAP: usize = 1000;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Decodes HTML entities (`&amp;`, `&#39;`, `&eacute;`, ...).
///
/// Returns `Cow::Borrowed` when there is nothing to decode.
pub fn unescape_html(s: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(s)
}

/// Counts Unicode scalar values, which is the unit every text budget uses.
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `n`th character, or `s.len()` past the end.
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

/// Turns feed description markup into a single line of plain text.
///
/// Steps, in order: cap the input at 1000 characters, replace newlines,
/// strip HTML tags, collapse whitespace runs, trim, decode entities, and drop
/// any remaining control characters.
pub fn sanitize_description(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let capped = &raw[..byte_offset(raw, SANITIZE_INPUT_CAP)];
    let flat = capped.replace(['\n', '\r'], " ");
    let untagged = HTML_TAG.replace_all(&flat, "");
    let collapsed = WHITESPACE_RUN.replace_all(&untagged, " ");

    unescape_html(collapsed.trim())
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

/// Truncates `s` to at most `max_chars` characters on a word boundary.
///
/// Text that already fits is returned unchanged (borrowed). Otherwise the
/// cut backs up to the last whitespace before the budget, trailing
/// whitespace and separators are dropped, and [`ELLIPSIS`] is appended; the
/// marker counts against the budget. A single word longer than the budget is
/// cut mid-word since there is no boundary to back up to.
///
/// ```
/// use feedfold::util::shorten;
///
/// assert_eq!(shorten("short text", 100), "short text");
/// assert_eq!(shorten("the quick brown fox", 12), "the quick…");
/// ```
pub fn shorten(s: &str, max_chars: usize) -> Cow<'_, str> {
    if char_len(s) <= max_chars {
        return Cow::Borrowed(s);
    }
    if max_chars <= ELLIPSIS_LEN {
        return Cow::Owned(s.chars().take(max_chars).collect());
    }

    let cut = byte_offset(s, max_chars - ELLIPSIS_LEN);
    let head = &s[..cut];
    let at_boundary = s[cut..].starts_with(char::is_whitespace);

    let word_head = if at_boundary {
        head
    } else {
        head.rfind(char::is_whitespace).map_or(head, |i| &head[..i])
    };

    let trimmed = trim_separators(word_head);
    let kept = if trimmed.is_empty() {
        trim_separators(head)
    } else {
        trimmed
    };

    Cow::Owned(format!("{kept}{ELLIPSIS}"))
}

fn trim_separators(s: &str) -> &str {
    s.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-'))
}

/// Sanitizes a raw feed description and shortens it to `max_chars`.
pub fn shorten_description(raw: &str, max_chars: usize) -> String {
    let clean = sanitize_description(raw);
    shorten(&clean, max_chars).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_shorten_fits_returns_borrowed() {
        let input = "A description well under budget.";
        let result = shorten(input, 200);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, input);
    }

    #[test]
    fn test_shorten_exact_fit() {
        assert_eq!(shorten("12345", 5), "12345");
    }

    #[test]
    fn test_shorten_cuts_on_word_boundary() {
        // budget 12 -> 11 chars of text: "the quick b" -> back up to "the quick"
        assert_eq!(shorten("the quick brown fox", 12), "the quick…");
        // budget 11 -> 10 chars "the quick " still backs up past the trailing space
        assert_eq!(shorten("the quick brown fox", 11), "the quick…");
    }

    #[test]
    fn test_shorten_drops_trailing_separators() {
        assert_eq!(shorten("alpha, beta gamma delta", 13), "alpha, beta…");
        assert_eq!(shorten("alpha, beta gamma delta", 10), "alpha…");
    }

    #[test]
    fn test_shorten_single_long_word_is_hard_cut() {
        assert_eq!(shorten("abcdefghijklmnop", 6), "abcde…");
    }

    #[test]
    fn test_shorten_tiny_budgets() {
        assert_eq!(shorten("hello world", 0), "");
        assert_eq!(shorten("hello world", 1), "h");
    }

    #[test]
    fn test_shorten_multibyte() {
        let input = "日本語 テキスト です とても 長い";
        let result = shorten(input, 8);
        assert!(result.chars().count() <= 8);
        assert_eq!(result, "日本語…");
    }

    #[test]
    fn test_shorten_500_char_description_to_200() {
        let input = "lorem ipsum dolor sit amet ".repeat(20);
        assert!(input.chars().count() >= 500);

        let result = shorten(input.trim(), 200);
        assert!(result.chars().count() <= 200);
        assert!(result.ends_with(ELLIPSIS));

        let body = result.trim_end_matches(ELLIPSIS);
        // the kept text is a prefix of the input that ends on a whole word
        assert!(input.starts_with(body));
        assert!(input[body.len()..].starts_with(' '));
    }

    #[test]
    fn test_sanitize_strips_tags_and_entities() {
        let raw = "<p>Hello&nbsp;<b>world</b> &amp;\n\n   friends</p>";
        assert_eq!(sanitize_description(raw), "Hello\u{a0}world & friends");
    }

    #[test]
    fn test_sanitize_drops_control_chars() {
        assert_eq!(sanitize_description("be\x07ll \x1b[31mred"), "bell [31mred");
    }

    #[test]
    fn test_sanitize_empty() {
        assert_eq!(sanitize_description(""), "");
        assert_eq!(sanitize_description("   <br/>  "), "");
    }

    #[test]
    fn test_sanitize_caps_input() {
        let raw = "x".repeat(5000);
        assert_eq!(sanitize_description(&raw).chars().count(), 1000);
    }

    #[test]
    fn test_shorten_description_combines_both() {
        let raw = format!("<div>{}</div>", "word ".repeat(100));
        let result = shorten_description(&raw, 100);
        assert!(result.chars().count() <= 100);
        assert!(result.starts_with("word word"));
        assert!(result.ends_with("word…"));
    }

    #[test]
    fn test_unescape_html() {
        assert_eq!(unescape_html("Tom &amp; Jerry&#39;s"), "Tom & Jerry's");
        assert!(matches!(unescape_html("plain"), Cow::Borrowed(_)));
    }

    proptest! {
        #[test]
        fn prop_shorten_never_exceeds_budget(s in "\\PC{0,400}", max in 0usize..250) {
            let out = shorten(&s, max);
            prop_assert!(out.chars().count() <= max);
        }

        #[test]
        fn prop_shorten_marks_truncation(s in "[a-z ]{0,300}", max in 2usize..250) {
            let out = shorten(&s, max);
            if s.chars().count() > max {
                prop_assert!(out.ends_with(ELLIPSIS));
            } else {
                prop_assert_eq!(out.as_ref(), s.as_str());
            }
        }
    }
}
