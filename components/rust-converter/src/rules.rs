//! Render rules that override the built-in tag handlers
//!
//! A [`RenderRule`] pairs a predicate with a renderer. The converter walks
//! its rule table in order before falling back to the tag `match`, so the
//! first matching rule wins and custom rules prepended with
//! [`MarkdownConverter::with_rule`] take priority over these defaults.
//!
//! The default table holds two rules:
//!
//! - `lazy_image` renders every `img` through the lazy-load resolution in
//!   [`crate::lazy_image`], with a placeholder alt text
//! - `inlined_link` renders `[content](href "title")` followed by a newline
//!   while the link style is [`LinkStyle::Inlined`]

use html5ever::Attribute;
use markup5ever_rcdom::{Handle, NodeData};

use crate::converter::{
    ConversionContext, ConversionOptions, LinkStyle, MarkdownConverter, element_attribute,
    push_destination,
};
use crate::error::ConversionError;
use crate::lazy_image::LazyImage;

/// Alt text for images that carry none
pub const PLACEHOLDER_ALT: &str = "图片";

/// Decides whether a rule applies to an element
pub type RuleMatcher = fn(node: &Handle, tag_name: &str, options: &ConversionOptions) -> bool;

/// Writes the Markdown for an element the rule matched
pub type RuleRenderer = fn(
    converter: &MarkdownConverter,
    node: &Handle,
    output: &mut String,
    depth: usize,
    ctx: &mut ConversionContext,
) -> Result<(), ConversionError>;

/// A named `(predicate, render)` pair consulted during the tree walk
#[derive(Debug, Clone, Copy)]
pub struct RenderRule {
    pub name: &'static str,
    pub matches: RuleMatcher,
    pub render: RuleRenderer,
}

/// Image rule with lazy-load resolution
pub const LAZY_IMAGE_RULE: RenderRule = RenderRule {
    name: "lazy_image",
    matches: is_image,
    render: render_lazy_image,
};

/// Inline link rule with a trailing newline
pub const INLINED_LINK_RULE: RenderRule = RenderRule {
    name: "inlined_link",
    matches: is_inlined_link,
    render: render_inlined_link,
};

/// The rule table every converter starts with, highest priority first
pub fn default_rules() -> Vec<RenderRule> {
    vec![LAZY_IMAGE_RULE, INLINED_LINK_RULE]
}

fn lazy_view(attrs: &[Attribute]) -> LazyImage<'_> {
    LazyImage::from_attributes(
        attrs
            .iter()
            .map(|attr| (attr.name.local.as_ref(), &*attr.value)),
    )
}

fn is_image(_node: &Handle, tag_name: &str, _options: &ConversionOptions) -> bool {
    tag_name == "img"
}

fn render_lazy_image(
    _converter: &MarkdownConverter,
    node: &Handle,
    output: &mut String,
    _depth: usize,
    _ctx: &mut ConversionContext,
) -> Result<(), ConversionError> {
    let NodeData::Element { ref attrs, .. } = node.data else {
        return Ok(());
    };
    let attrs = attrs.borrow();
    let image = lazy_view(&attrs);

    // The resolved source is emitted as is, inline `data:` images included
    let Some(src) = image.resolve_src() else {
        return Ok(());
    };
    let src = src.trim();
    if src.is_empty() {
        return Ok(());
    }

    let alt = image
        .attribute("alt")
        .map(str::trim)
        .filter(|alt| !alt.is_empty())
        .unwrap_or(PLACEHOLDER_ALT);
    let title = image.attribute("title").filter(|title| !title.is_empty());

    output.push_str("![");
    output.push_str(alt);
    output.push(']');
    push_destination(output, src, title);

    Ok(())
}

fn is_inlined_link(node: &Handle, tag_name: &str, options: &ConversionOptions) -> bool {
    tag_name == "a"
        && options.link_style == LinkStyle::Inlined
        && element_attribute(node, "href").is_some_and(|href| !href.trim().is_empty())
}

fn render_inlined_link(
    converter: &MarkdownConverter,
    node: &Handle,
    output: &mut String,
    depth: usize,
    ctx: &mut ConversionContext,
) -> Result<(), ConversionError> {
    let mut content = String::new();
    converter.render_children(node, &mut content, depth, ctx)?;
    let content = content.trim();

    let href = element_attribute(node, "href").unwrap_or_default();
    let Some(href) = converter.security().sanitize_url(href.trim()) else {
        output.push_str(content);
        return Ok(());
    };
    let title = element_attribute(node, "title").filter(|title| !title.is_empty());

    output.push('[');
    output.push_str(content);
    output.push(']');
    push_destination(output, href, title.as_deref());
    output.push('\n');

    Ok(())
}
