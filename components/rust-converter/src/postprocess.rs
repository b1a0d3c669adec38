//! Text transforms applied to every backend's raw Markdown
//!
//! Both transforms are pure functions of the string and run in a fixed
//! order through [`postprocess_markdown`]:
//!
//! 1. [`escape_multiline_links`] keeps link text on one logical line by
//!    turning each raw newline inside `[...]` into a backslash line break.
//! 2. [`remove_skip_to_content_links`] drops `[Skip to Content](#…)`
//!    navigation boilerplate.
//!
//! # Bracket counting
//!
//! The link scan counts brackets and nothing else. Escaped brackets (`\[`)
//! and brackets inside code spans move the depth like any other bracket, so
//! a newline that follows an unbalanced `[` in inline code is escaped too.

use std::sync::LazyLock;

use regex::Regex;

static SKIP_TO_CONTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[Skip to Content\]\(#[^)]*\)").expect("skip link pattern is valid")
});

/// Apply both transforms in order
///
/// ```rust
/// use html_markdown_converter::postprocess::postprocess_markdown;
///
/// let markdown = "[Skip to Content](#main)\n[multi\nline](https://example.com)\n";
/// assert_eq!(
///     postprocess_markdown(markdown),
///     "\n[multi\\\nline](https://example.com)\n",
/// );
/// ```
pub fn postprocess_markdown(markdown: &str) -> String {
    let escaped = escape_multiline_links(markdown);
    remove_skip_to_content_links(&escaped)
}

/// Replace every newline inside link text with `\` followed by the newline
///
/// Depth rises on `[` and falls on `]`, never below zero.
pub fn escape_multiline_links(markdown: &str) -> String {
    let mut link_open_depth: usize = 0;
    let mut result = String::with_capacity(markdown.len());

    for ch in markdown.chars() {
        match ch {
            '[' => link_open_depth += 1,
            ']' => link_open_depth = link_open_depth.saturating_sub(1),
            '\n' if link_open_depth > 0 => result.push('\\'),
            _ => {}
        }
        result.push(ch);
    }

    result
}

/// Remove `[Skip to Content](#…)` links, ignoring case
pub fn remove_skip_to_content_links(markdown: &str) -> String {
    SKIP_TO_CONTENT_RE.replace_all(markdown, "").into_owned()
}
