//! HTML5 parser using html5ever
//!
//! This module provides HTML parsing functionality that handles malformed
//! markup gracefully according to the HTML5 specification.
//!
//! # Overview
//!
//! The parser uses html5ever, which implements the WHATWG HTML5 parsing
//! algorithm. Even malformed HTML is parsed consistently and predictably,
//! following the same rules as modern web browsers. This matters for scraped
//! pages, which routinely carry unclosed tags, misnested formatting and
//! stray attributes.
//!
//! # Examples
//!
//! ```rust
//! use html_markdown_converter::parser::parse_html;
//!
//! // Parse well-formed HTML
//! let dom = parse_html("<html><body><h1>Hello</h1></body></html>").expect("Failed to parse HTML");
//!
//! // Parse malformed HTML (missing closing tags)
//! let dom = parse_html("<html><body><h1>Hello").expect("Parser handles malformed HTML");
//! ```
//!
//! # Configuration
//!
//! The parser uses default html5ever configuration:
//! - **Scripting**: Disabled (scripts are not executed)
//! - **Error Handling**: Errors are collected but parsing continues
//! - **Tree Builder**: Uses RcDom for reference-counted DOM nodes
//!
//! Input is already text: the scraping service hands over decoded page
//! content, so no charset sniffing happens here.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::RcDom;

use crate::error::ConversionError;

/// Parse HTML text into a DOM tree
///
/// # Arguments
///
/// * `html` - HTML document or fragment as UTF-8 text
///
/// # Returns
///
/// Returns `Ok(RcDom)` containing the parsed DOM tree on success.
///
/// # Errors
///
/// - `ConversionError::InvalidInput`: Input is empty
///
/// html5ever itself never rejects a document; malformed markup is repaired
/// per the HTML5 tree construction rules.
///
/// # Examples
///
/// ```rust
/// use html_markdown_converter::parser::parse_html;
///
/// let dom = parse_html("<div><p>Content</p></div>").expect("Failed to parse");
/// ```
pub fn parse_html(html: &str) -> Result<RcDom, ConversionError> {
    if html.is_empty() {
        return Err(ConversionError::InvalidInput(
            "HTML input is empty".to_string(),
        ));
    }

    // Parse directly from a UTF-8 string sink to avoid `std::io::Read`
    // overhead in the hot path.
    let dom = parse_document(RcDom::default(), Default::default()).one(html);

    Ok(dom)
}
