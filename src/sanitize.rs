/// Rich-text sanitization for annotation bodies
///
/// Annotation body values are HTML fragments typed by viewers of the
/// public page. Fragments are parsed with html5ever (through `ammonia`);
/// only a small set of formatting tags survives, script-like elements are
/// removed together with their content, every other tag is unwrapped to its
/// text, and attributes and URL schemes are filtered per tag.
use ammonia::Builder;
use std::collections::{HashMap, HashSet};

/// Rich-text sanitizer collaborator
pub trait Sanitizer: Send + Sync {
    /// Return a copy of `html` that is safe to store and render
    fn sanitize(&self, html: &str) -> String;
}

/// Elements dropped together with everything inside them
const STRIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template", "textarea",
];

/// Tags kept in sanitized output
const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "code", "del", "em", "h1", "h2", "h3", "h4", "h5",
    "h6", "hr", "i", "img", "ins", "li", "mark", "ol", "p", "pre", "s", "small", "span",
    "strong", "sub", "sup", "u", "ul",
];

/// Attributes kept on any allowed tag
const GLOBAL_ATTRIBUTES: &[&str] = &["class", "title", "lang", "dir"];

/// Schemes accepted in `href` and `src`; relative URLs pass through
const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

// `rel` is not listed: links always get `rel="noopener noreferrer"`
const TAG_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href", "target"]),
    ("img", &["src", "alt", "width", "height"]),
    ("abbr", &["title"]),
];

/// Allowlist-based HTML sanitizer
pub struct HtmlSanitizer {
    cleaner: Builder<'static>,
}

impl HtmlSanitizer {
    /// Build the sanitizer with the annotation body allowlist
    pub fn new() -> Self {
        let tag_attributes: HashMap<&'static str, HashSet<&'static str>> = TAG_ATTRIBUTES
            .iter()
            .map(|(tag, attrs)| (*tag, attrs.iter().copied().collect()))
            .collect();

        let mut cleaner = Builder::default();
        cleaner
            .tags(ALLOWED_TAGS.iter().copied().collect())
            .clean_content_tags(STRIPPED_ELEMENTS.iter().copied().collect())
            .tag_attributes(tag_attributes)
            .generic_attributes(GLOBAL_ATTRIBUTES.iter().copied().collect())
            .url_schemes(URL_SCHEMES.iter().copied().collect())
            .strip_comments(true);

        Self { cleaner }
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer for HtmlSanitizer {
    fn sanitize(&self, html: &str) -> String {
        self.cleaner.clean(html).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(html: &str) -> String {
        HtmlSanitizer::new().sanitize(html)
    }

    #[test]
    fn test_script_removed_with_content() {
        assert_eq!(clean("<script>x</script>"), "");
        assert_eq!(
            clean("before<SCRIPT type=\"text/javascript\">alert(1)</script >after"),
            "beforeafter"
        );
    }

    #[test]
    fn test_unclosed_script_dropped() {
        assert_eq!(clean("note <script>alert(1)"), "note ");
    }

    #[test]
    fn test_allowed_formatting_kept() {
        assert_eq!(
            clean("<p>A <strong>bold</strong> <em>claim</em></p>"),
            "<p>A <strong>bold</strong> <em>claim</em></p>"
        );
    }

    #[test]
    fn test_unknown_tags_unwrapped() {
        assert_eq!(clean("<div><blink>hi</blink></div>"), "hi");
    }

    #[test]
    fn test_event_handlers_dropped() {
        assert_eq!(
            clean("<p onclick=\"steal()\" class=\"note\">x</p>"),
            "<p class=\"note\">x</p>"
        );
    }

    #[test]
    fn test_quoted_angle_bracket_in_attribute() {
        assert_eq!(
            clean("<p title=\"a>b\">note</p>"),
            "<p title=\"a>b\">note</p>"
        );
    }

    #[test]
    fn test_javascript_links_dropped() {
        let cleaned = clean("<a href=\"java\tscript:alert(1)\" title=\"t\">x</a>");
        assert!(!cleaned.contains("href"));
        assert!(cleaned.contains("title=\"t\""));
        assert!(cleaned.contains(">x</a>"));

        let cleaned = clean("<a href='https://example.org/a?b=1&c=2'>x</a>");
        assert!(cleaned.contains("href=\"https://example.org/a?b=1&amp;c=2\""));
        assert!(cleaned.contains("rel=\"noopener noreferrer\""));
    }

    #[test]
    fn test_data_images_dropped() {
        assert_eq!(clean("<img src=\"data:image/png;base64,AAAA\" alt=\"a\">"), "<img alt=\"a\">");
    }

    #[test]
    fn test_void_elements_and_comments() {
        assert_eq!(clean("line<br/>next<!-- hidden -->"), "line<br>next");
    }

    #[test]
    fn test_plain_text_escaped() {
        assert_eq!(clean("a < b and c > d"), "a &lt; b and c &gt; d");
    }
}
