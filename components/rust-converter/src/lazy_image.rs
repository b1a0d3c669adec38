//! Lazy-load image resolution
//!
//! Article feeds (WeChat public-account pages in particular) ship `<img>`
//! elements whose `src` is an inline SVG placeholder while the real URL sits
//! in a non-standard attribute such as `data-src`. Rendering those elements
//! as-is produces Markdown full of placeholder images.
//!
//! This module owns the one resolution algorithm both backends follow:
//!
//! 1. A non-empty `data-src` wins outright.
//! 2. Otherwise, when `src` is an SVG data URI or the element carries
//!    site-specific lazy-load markers, the first alternate attribute
//!    (`data-backsrc`, `data-fail-src`, `data-failsrc`, `data-original`,
//!    `data-backupsrc`) holding an `http(s)://` URL is used.
//! 3. Otherwise `src` is kept unchanged.
//!
//! Resolved URLs are stripped of the `&wx_lazy=<n>` and `&wx_co=<n>` query
//! fragments.
//!
//! [`LazyImage`] applies the algorithm to an attribute list (the fallback
//! renderer feeds it DOM attributes), and [`normalize_lazy_images`] applies
//! it to raw HTML text before a renderer sees it (the native component's
//! pre-pass). Both are idempotent.
//!
//! # Examples
//!
//! ```rust
//! use html_markdown_converter::lazy_image::{LazyImage, normalize_lazy_images};
//!
//! let image = LazyImage::from_attributes([
//!     ("src", "data:image/svg+xml,%3Csvg%3E"),
//!     ("data-original", "http://cdn.example.com/a.png"),
//! ]);
//! assert_eq!(image.resolve_src().as_deref(), Some("http://cdn.example.com/a.png"));
//!
//! let html = normalize_lazy_images(r#"<img data-src="https://a.example/x.png&wx_lazy=1">"#);
//! assert_eq!(html, r#"<img src="https://a.example/x.png" data-src="https://a.example/x.png&wx_lazy=1">"#);
//! ```

use std::borrow::Cow;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// Alternate URL attributes, in the order they are consulted
const ALTERNATE_SOURCE_ATTRIBUTES: &[&str] = &[
    "data-backsrc",
    "data-fail-src",
    "data-failsrc",
    "data-original",
    "data-backupsrc",
];

/// Class name fragments used by WeChat article images
const LAZY_CLASS_MARKERS: &[&str] = &["rich_pages", "wxw-img"];

/// CDN host and format query markers found in WeChat image URLs
const LAZY_SRC_MARKERS: &[&str] = &["mmbiz.qpic.cn", "wx_fmt="];

const SVG_PLACEHOLDER_PREFIX: &str = "data:image/svg";

static LAZY_QUERY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&wx_(?:lazy|co)=\d+").expect("LAZY_QUERY_RE should compile"));

static IMG_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img(?:[\s/][^>]*)?>").expect("IMG_TAG_RE should compile"));

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("ATTRIBUTE_RE should compile")
});

/// Attribute view of one `<img>` element
///
/// Attribute names are matched ASCII case-insensitively; when a name occurs
/// more than once the first occurrence wins, as in the HTML5 tree builder.
#[derive(Debug, Clone, Default)]
pub struct LazyImage<'a> {
    attrs: Vec<(&'a str, &'a str)>,
}

impl<'a> LazyImage<'a> {
    /// Build a view from `(name, value)` pairs
    pub fn from_attributes<I>(attrs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            attrs: attrs.into_iter().collect(),
        }
    }

    /// Value of the first attribute called `name`
    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.attrs
            .iter()
            .find(|(attr_name, _)| attr_name.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }

    /// Whether the element looks like a lazy-loaded or site-specific image
    ///
    /// Three independent signals, any of which is enough: a `data-src`
    /// attribute, a marker in `class`, or a CDN/format marker in `src`.
    pub fn is_lazy(&self) -> bool {
        if self.attribute("data-src").is_some() {
            return true;
        }

        let class_marked = self
            .attribute("class")
            .is_some_and(|class| LAZY_CLASS_MARKERS.iter().any(|m| class.contains(m)));
        if class_marked {
            return true;
        }

        self.attribute("src")
            .is_some_and(|src| LAZY_SRC_MARKERS.iter().any(|m| src.contains(m)))
    }

    /// Whether `src` is an inline SVG placeholder
    pub fn has_placeholder_src(&self) -> bool {
        self.attribute("src").is_some_and(|src| {
            let src = src.trim_start();
            src.len() >= SVG_PLACEHOLDER_PREFIX.len()
                && src.as_bytes()[..SVG_PLACEHOLDER_PREFIX.len()]
                    .eq_ignore_ascii_case(SVG_PLACEHOLDER_PREFIX.as_bytes())
        })
    }

    /// Resolve the URL the element should render with
    ///
    /// Returns `None` only when there is no `src` and nothing to resolve.
    pub fn resolve_src(&self) -> Option<String> {
        if let Some(data_src) = self.attribute("data-src").filter(|v| !v.is_empty()) {
            return Some(strip_lazy_params(data_src).into_owned());
        }

        if self.has_placeholder_src() || self.is_lazy() {
            let alternate = ALTERNATE_SOURCE_ATTRIBUTES
                .iter()
                .filter_map(|name| self.attribute(name))
                .find(|value| is_http_url(value));
            if let Some(url) = alternate {
                return Some(strip_lazy_params(url).into_owned());
            }
        }

        self.attribute("src").map(str::to_string)
    }
}

/// Remove `&wx_lazy=<n>` and `&wx_co=<n>` fragments from a URL
pub fn strip_lazy_params(url: &str) -> Cow<'_, str> {
    LAZY_QUERY_RE.replace_all(url, "")
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim_start().as_bytes();
    let has_prefix = |prefix: &str| {
        value.len() >= prefix.len() && value[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    };
    has_prefix("http://") || has_prefix("https://")
}

/// Rewrite every `<img>` tag in `html` so its `src` holds the resolved URL
///
/// Tags whose resolution does not change `src` are left byte-for-byte
/// untouched. A missing `src` is inserted directly after `<img`.
pub fn normalize_lazy_images(html: &str) -> String {
    IMG_TAG_RE
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let tag = &caps[0];
            rewrite_img_tag(tag).unwrap_or_else(|| tag.to_string())
        })
        .into_owned()
}

struct RawAttribute {
    name: String,
    value: String,
    span: Range<usize>,
}

fn rewrite_img_tag(tag: &str) -> Option<String> {
    // Skip the literal `<img`
    let body = tag.get(4..)?;
    let attrs: Vec<RawAttribute> = ATTRIBUTE_RE
        .captures_iter(body)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| decode_attribute(m.as_str()))
                .unwrap_or_default();
            Some(RawAttribute {
                name,
                value,
                span: whole.range(),
            })
        })
        .collect();

    let image =
        LazyImage::from_attributes(attrs.iter().map(|a| (a.name.as_str(), a.value.as_str())));
    let resolved = image.resolve_src()?;
    if image.attribute("src") == Some(resolved.as_str()) {
        return None;
    }

    let replacement = format!("src=\"{}\"", escape_attribute(&resolved));
    let rewritten = match attrs.iter().find(|a| a.name == "src") {
        Some(src) => format!(
            "<img{}{}{}",
            &body[..src.span.start],
            replacement,
            &body[src.span.end..]
        ),
        None => format!("<img {}{}", replacement, body),
    };
    Some(rewritten)
}

/// Decode the entities that commonly appear inside attribute values
fn decode_attribute(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    // `&amp;` goes last so `&amp;quot;` decodes to a literal `&quot;`
    value
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PLACEHOLDER: &str =
        "data:image/svg+xml,%3C%3Fxml version='1.0'%3F%3E%3Csvg width='1px' height='1px'%3E%3C/svg%3E";

    #[test]
    fn test_data_src_wins() {
        let image = LazyImage::from_attributes([
            ("src", PLACEHOLDER),
            ("data-src", "https://mmbiz.qpic.cn/a.png?wx_fmt=png&wx_lazy=1&wx_co=1"),
            ("data-original", "http://other.example/b.png"),
        ]);
        assert_eq!(
            image.resolve_src().as_deref(),
            Some("https://mmbiz.qpic.cn/a.png?wx_fmt=png")
        );
    }

    #[test]
    fn test_empty_data_src_is_ignored() {
        let image = LazyImage::from_attributes([
            ("data-src", ""),
            ("src", PLACEHOLDER),
            ("data-backsrc", "https://cdn.example/real.jpg"),
        ]);
        assert_eq!(
            image.resolve_src().as_deref(),
            Some("https://cdn.example/real.jpg")
        );
    }

    #[test]
    fn test_placeholder_uses_data_original() {
        let image =
            LazyImage::from_attributes([("src", PLACEHOLDER), ("data-original", "http://Y")]);
        assert_eq!(image.resolve_src().as_deref(), Some("http://Y"));
    }

    #[test]
    fn test_alternate_priority_order() {
        let image = LazyImage::from_attributes([
            ("src", PLACEHOLDER),
            ("data-backupsrc", "https://e.example/5.png"),
            ("data-original", "https://d.example/4.png"),
            ("data-failsrc", "https://c.example/3.png"),
            ("data-fail-src", "https://b.example/2.png"),
        ]);
        assert_eq!(
            image.resolve_src().as_deref(),
            Some("https://b.example/2.png")
        );
    }

    #[test]
    fn test_alternate_must_be_http() {
        let image = LazyImage::from_attributes([
            ("src", PLACEHOLDER),
            ("data-backsrc", "/relative/path.png"),
            ("data-original", "HTTPS://cdn.example/x.png"),
        ]);
        assert_eq!(
            image.resolve_src().as_deref(),
            Some("HTTPS://cdn.example/x.png")
        );
    }

    #[test]
    fn test_class_marker_triggers_alternate_scan() {
        let image = LazyImage::from_attributes([
            ("class", "rich_pages wxw-img"),
            ("src", "https://example.com/thumb.gif"),
            ("data-backsrc", "https://example.com/full.jpg"),
        ]);
        assert!(image.is_lazy());
        assert_eq!(
            image.resolve_src().as_deref(),
            Some("https://example.com/full.jpg")
        );
    }

    #[test]
    fn test_plain_image_keeps_src() {
        let image = LazyImage::from_attributes([
            ("src", "https://example.com/a.png&wx_lazy=1"),
            ("data-original", "https://example.com/b.png"),
        ]);
        assert!(!image.is_lazy());
        assert_eq!(
            image.resolve_src().as_deref(),
            Some("https://example.com/a.png&wx_lazy=1")
        );
    }

    #[test]
    fn test_placeholder_without_alternates_is_kept() {
        let image = LazyImage::from_attributes([("src", PLACEHOLDER)]);
        assert_eq!(image.resolve_src().as_deref(), Some(PLACEHOLDER));
        assert!(LazyImage::from_attributes([("alt", "x")]).resolve_src().is_none());
    }

    #[test]
    fn test_classification_signals() {
        assert!(LazyImage::from_attributes([("data-src", "")]).is_lazy());
        assert!(LazyImage::from_attributes([("class", "img rich_pages")]).is_lazy());
        assert!(
            LazyImage::from_attributes([("src", "https://mmbiz.qpic.cn/mmbiz_png/x/640")])
                .is_lazy()
        );
        assert!(LazyImage::from_attributes([("src", "https://a.example/x?wx_fmt=jpeg")]).is_lazy());
        assert!(!LazyImage::from_attributes([("src", "https://a.example/x.jpeg")]).is_lazy());
    }

    #[test]
    fn test_attribute_names_are_case_insensitive() {
        let image = LazyImage::from_attributes([("SRC", PLACEHOLDER), ("data-backupSrc", "https://z")]);
        assert!(image.has_placeholder_src());
        assert_eq!(image.resolve_src().as_deref(), Some("https://z"));
    }

    #[test]
    fn test_strip_lazy_params() {
        assert_eq!(
            strip_lazy_params("https://a/x.png?wx_fmt=png&wx_lazy=12&tp=webp&wx_co=1"),
            "https://a/x.png?wx_fmt=png&tp=webp"
        );
        assert_eq!(strip_lazy_params("https://a/x.png?wx_lazy=1"), "https://a/x.png?wx_lazy=1");
    }

    #[test]
    fn test_normalize_replaces_existing_src() {
        let html = format!(
            r#"<p><img class="rich_pages" src="{}" data-src="https://mmbiz.qpic.cn/a.png?wx_fmt=png&amp;wx_lazy=1"></p>"#,
            PLACEHOLDER
        );
        let normalized = normalize_lazy_images(&html);
        assert_eq!(
            normalized,
            r#"<p><img class="rich_pages" src="https://mmbiz.qpic.cn/a.png?wx_fmt=png" data-src="https://mmbiz.qpic.cn/a.png?wx_fmt=png&amp;wx_lazy=1"></p>"#
        );
    }

    #[test]
    fn test_normalize_injects_missing_src() {
        let normalized = normalize_lazy_images("<IMG data-src='https://a.example/x.png' alt=x>");
        assert_eq!(
            normalized,
            r#"<img src="https://a.example/x.png" data-src='https://a.example/x.png' alt=x>"#
        );
    }

    #[test]
    fn test_normalize_leaves_plain_images_untouched() {
        let html = r#"<img src="https://example.com/a.png" alt="A"><img>"#;
        assert_eq!(normalize_lazy_images(html), html);
    }

    #[test]
    fn test_normalize_skips_custom_elements() {
        let html = r#"<img-viewer data-src="https://a/x.png"></img-viewer><img data-src="https://a/y.png">"#;
        assert_eq!(
            normalize_lazy_images(html),
            r#"<img-viewer data-src="https://a/x.png"></img-viewer><img src="https://a/y.png" data-src="https://a/y.png">"#
        );
    }

    #[test]
    fn test_normalize_unquoted_placeholder() {
        let html = "<img src=data:image/svg+xml;base64,AAAA data-original=http://Y/z.png>";
        assert_eq!(
            normalize_lazy_images(html),
            r#"<img src="http://Y/z.png" data-original=http://Y/z.png>"#
        );
    }

    #[test]
    fn test_normalize_is_idempotent_on_examples() {
        let samples = [
            r#"<img data-src="https://a/x.png&amp;wx_co=1" src="data:image/svg+xml,x">"#.to_string(),
            format!(r#"<img src="{PLACEHOLDER}" data-failsrc="https://f/y.png">"#),
            r#"<img class="wxw-img" data-backsrc="https://g/z.png" src="https://g/thumb">"#.to_string(),
        ];
        for html in samples {
            let once = normalize_lazy_images(&html);
            let twice = normalize_lazy_images(&once);
            assert_eq!(once, twice);
        }
    }

    fn attr_value() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            Just(PLACEHOLDER.to_string()),
            "https://[a-z]{1,8}\\.example/[a-z]{1,8}\\.png(&wx_lazy=[0-9]{1,2})?",
            "/[a-z]{1,8}",
        ]
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(
            src in prop::option::of(attr_value()),
            data_src in prop::option::of(attr_value()),
            alternate in prop::sample::select(ALTERNATE_SOURCE_ATTRIBUTES.to_vec()),
            alternate_value in attr_value(),
            class_marked in prop::bool::ANY,
        ) {
            let mut tag = String::from("<img");
            if class_marked {
                tag.push_str(" class=\"rich_pages\"");
            }
            if let Some(src) = &src {
                tag.push_str(&format!(" src=\"{}\"", src));
            }
            if let Some(data_src) = &data_src {
                tag.push_str(&format!(" data-src=\"{}\"", data_src));
            }
            tag.push_str(&format!(" {}=\"{}\">", alternate, alternate_value));

            let once = normalize_lazy_images(&tag);
            let twice = normalize_lazy_images(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_data_src_resolves_to_stripped_value(
            host in "[a-z]{1,10}",
            lazy in 0u32..100,
        ) {
            let url = format!("https://{}.example/img.png?wx_fmt=png", host);
            let data_src = format!("{}&wx_lazy={}", url, lazy);
            let image = LazyImage::from_attributes([("data-src", data_src.as_str()), ("src", PLACEHOLDER)]);
            prop_assert_eq!(image.resolve_src(), Some(url));
        }
    }
}
