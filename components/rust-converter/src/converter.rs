//! Markdown converter - transforms DOM tree to Markdown
//!
//! This module is the rule-based fallback renderer. It walks an html5ever DOM
//! tree depth-first and writes Markdown into a single output buffer.
//!
//! # Conversion Strategy
//!
//! For each element the converter:
//!
//! 1. Drops non-content and dangerous elements (see [`crate::security`])
//! 2. Enforces the nesting depth limit
//! 3. Consults the [`RenderRule`] table in priority order; the first rule
//!    whose predicate matches renders the element
//! 4. Otherwise dispatches on the tag name to a default handler
//!
//! The default rule table ([`crate::rules::default_rules`]) overrides images
//! (lazy-load resolution) and inline links (trailing newline). Everything
//! else goes through the built-in handlers:
//!
//! - **Headings (h1-h6)**: ATX-style headings (`#` to `######`)
//! - **Paragraphs, blockquotes, horizontal rules, line breaks**
//! - **Lists**: nested with indentation, ordered lists honour `start`
//! - **Code**: fenced or indented blocks, backtick inline code
//! - **Emphasis**: configurable delimiters
//! - **GFM extensions**: tables, strikethrough, task list checkboxes
//! - **Links**: inline or referenced, with three reference styles
//!
//! # Examples
//!
//! Input HTML:
//! ```html
//! <h1>Main Title</h1>
//! <p>Some <strong>content</strong> here.</p>
//! ```
//!
//! Output Markdown:
//! ```markdown
//! # Main Title
//!
//! Some **content** here.
//! ```
//!
//! # Output Normalization
//!
//! The raw buffer is normalized before it is returned: LF line endings,
//! no runs of blank lines, no trailing whitespace, single spaces outside
//! code, exactly one final newline.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::error::{ConversionError, RenderFailure};
use crate::parser::parse_html;
use crate::rules::{RenderRule, default_rules};
use crate::security::{SanitizeAction, SecurityValidator};

/// Markdown flavor selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkdownFlavor {
    /// CommonMark baseline
    CommonMark,
    /// GitHub Flavored Markdown
    GitHubFlavoredMarkdown,
}

/// How links are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStyle {
    /// `[text](href)`
    Inlined,
    /// `[text][id]` plus a definition after the body
    Referenced,
}

/// Reference flavour used with [`LinkStyle::Referenced`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkReferenceStyle {
    /// `[text][1]` with `[1]: href`
    Full,
    /// `[text][]` with `[text]: href`
    Collapsed,
    /// `[text]` with `[text]: href`
    Shortcut,
}

/// How `pre` blocks are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeBlockStyle {
    Fenced,
    Indented,
}

/// Table column alignment (GFM)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableAlignment {
    Left,
    Center,
    Right,
}

/// Conversion options
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Markdown flavor to generate
    pub flavor: MarkdownFlavor,
    pub link_style: LinkStyle,
    pub link_reference_style: LinkReferenceStyle,
    pub code_block_style: CodeBlockStyle,
    /// Marker for unordered list items
    pub bullet_list_marker: char,
    /// Delimiter around emphasized text
    pub em_delimiter: &'static str,
    /// Delimiter around strong text
    pub strong_delimiter: &'static str,
    /// Thematic break written for `hr`
    pub horizontal_rule: &'static str,
    /// Cooperative time budget for one conversion (zero disables it)
    pub timeout: Duration,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            flavor: MarkdownFlavor::GitHubFlavoredMarkdown,
            link_style: LinkStyle::Inlined,
            link_reference_style: LinkReferenceStyle::Full,
            code_block_style: CodeBlockStyle::Fenced,
            bullet_list_marker: '-',
            em_delimiter: "*",
            strong_delimiter: "**",
            horizontal_rule: "* * *",
            timeout: Duration::ZERO,
        }
    }
}

/// Conversion context for tracking timeout, node count and per-document state
///
/// This struct implements a cooperative timeout mechanism that checks elapsed time
/// at regular intervals during conversion. The timeout is cooperative (not preemptive),
/// meaning conversion must reach a checkpoint to detect timeout.
///
/// # Checkpoints
///
/// Timeout is checked at these key points:
/// 1. Every 100 DOM nodes during traversal
/// 2. Before output normalization
/// 3. After output normalization
///
/// The context also carries state that lives for one document: the current
/// list nesting and the link reference definitions collected so far.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use html_markdown_converter::converter::ConversionContext;
///
/// // Create context with 5 second timeout
/// let ctx = ConversionContext::new(Duration::from_secs(5));
///
/// // Check timeout during processing
/// if let Err(e) = ctx.check_timeout() {
///     println!("Timeout exceeded: {}", e);
/// }
/// ```
#[derive(Debug)]
pub struct ConversionContext {
    /// Start time of conversion
    start_time: Instant,
    /// Timeout duration (0 means no timeout)
    timeout: Duration,
    /// Number of nodes processed (for checkpoint frequency)
    node_count: u32,
    /// Number of enclosing lists
    list_depth: usize,
    /// Reference definitions, in order of first use
    references: Vec<String>,
}

impl ConversionContext {
    /// Create a new conversion context with the specified timeout
    ///
    /// # Arguments
    ///
    /// * `timeout` - Maximum duration for conversion (Duration::ZERO means no timeout)
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use html_markdown_converter::converter::ConversionContext;
    ///
    /// // 5 second timeout
    /// let ctx = ConversionContext::new(Duration::from_secs(5));
    ///
    /// // No timeout
    /// let ctx_unlimited = ConversionContext::new(Duration::ZERO);
    /// ```
    pub fn new(timeout: Duration) -> Self {
        Self {
            start_time: Instant::now(),
            timeout,
            node_count: 0,
            list_depth: 0,
            references: Vec::new(),
        }
    }

    /// Check if timeout has been exceeded
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Conversion is within timeout limit
    /// - `Err(ConversionError::Timeout)` - Timeout has been exceeded
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use html_markdown_converter::converter::ConversionContext;
    ///
    /// let ctx = ConversionContext::new(Duration::from_millis(100));
    /// std::thread::sleep(Duration::from_millis(150));
    ///
    /// assert!(ctx.check_timeout().is_err());
    /// ```
    pub fn check_timeout(&self) -> Result<(), ConversionError> {
        // If timeout is zero, no timeout is enforced
        if self.timeout.is_zero() {
            return Ok(());
        }

        if self.start_time.elapsed() > self.timeout {
            return Err(ConversionError::Timeout);
        }

        Ok(())
    }

    /// Increment node count and check timeout if at checkpoint
    ///
    /// Called for each DOM node processed; the clock is read every 100 nodes.
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use html_markdown_converter::converter::ConversionContext;
    ///
    /// let mut ctx = ConversionContext::new(Duration::from_secs(5));
    ///
    /// for _ in 0..1000 {
    ///     ctx.increment_and_check()?;
    /// }
    /// # Ok::<(), html_markdown_converter::error::ConversionError>(())
    /// ```
    pub fn increment_and_check(&mut self) -> Result<(), ConversionError> {
        self.node_count += 1;

        // Check timeout every 100 nodes (checkpoint frequency)
        if self.node_count.is_multiple_of(100) {
            self.check_timeout()?;
        }

        Ok(())
    }

    /// Get elapsed time since conversion started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get number of nodes processed
    pub fn node_count(&self) -> u32 {
        self.node_count
    }
}

/// Main Markdown converter
///
/// Holds the options, the security policy and the rule table. A converter
/// has no per-document state, so one instance can serve any number of
/// conversions (including concurrent ones from different threads).
///
/// # Usage
///
/// ```rust
/// use html_markdown_converter::converter::{MarkdownConverter, ConversionOptions, MarkdownFlavor};
/// use html_markdown_converter::parser::parse_html;
///
/// // Create converter with default options (GFM, inline links)
/// let converter = MarkdownConverter::new();
///
/// // Or with custom options
/// let options = ConversionOptions {
///     flavor: MarkdownFlavor::CommonMark,
///     ..Default::default()
/// };
/// let converter = MarkdownConverter::with_options(options);
///
/// // Parse HTML and convert
/// let dom = parse_html("<h1>Title</h1><p>Content</p>").expect("Failed to parse");
/// let markdown = converter.convert(&dom).expect("Failed to convert");
/// assert!(markdown.starts_with("# Title"));
/// ```
#[derive(Debug, Clone)]
pub struct MarkdownConverter {
    options: ConversionOptions,
    security_validator: SecurityValidator,
    rules: Vec<RenderRule>,
}

impl MarkdownConverter {
    /// Create a new converter with default options and the default rules
    pub fn new() -> Self {
        Self::with_options(ConversionOptions::default())
    }

    /// Create a new converter with custom options and the default rules
    ///
    /// ```rust
    /// use html_markdown_converter::converter::{
    ///     ConversionOptions, LinkReferenceStyle, LinkStyle, MarkdownConverter,
    /// };
    ///
    /// let options = ConversionOptions {
    ///     link_style: LinkStyle::Referenced,
    ///     link_reference_style: LinkReferenceStyle::Collapsed,
    ///     ..Default::default()
    /// };
    /// let converter = MarkdownConverter::with_options(options);
    /// ```
    pub fn with_options(options: ConversionOptions) -> Self {
        Self::with_rules(options, default_rules())
    }

    /// Create a converter with its own rule table
    ///
    /// An empty table leaves every element to the built-in handlers.
    pub fn with_rules(options: ConversionOptions, rules: Vec<RenderRule>) -> Self {
        Self {
            options,
            security_validator: SecurityValidator::new(),
            rules,
        }
    }

    /// Lower or raise the element nesting limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.security_validator = SecurityValidator::with_max_depth(max_depth);
        self
    }

    /// Add a rule ahead of every rule already registered
    pub fn with_rule(mut self, rule: RenderRule) -> Self {
        self.rules.insert(0, rule);
        self
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    pub fn rules(&self) -> &[RenderRule] {
        &self.rules
    }

    pub(crate) fn security(&self) -> &SecurityValidator {
        &self.security_validator
    }

    /// Parse and convert an HTML document
    ///
    /// This is the fallback renderer's entry point. Any error or panic raised
    /// while parsing or walking the tree becomes a [`RenderFailure`]. A
    /// document without content renders as the empty string.
    ///
    /// ```rust
    /// use html_markdown_converter::converter::MarkdownConverter;
    ///
    /// let converter = MarkdownConverter::new();
    /// let markdown = converter.render_html("<p>Hello <em>world</em></p>").expect("render");
    /// assert_eq!(markdown, "Hello *world*\n");
    /// ```
    pub fn render_html(&self, html: &str) -> Result<String, RenderFailure> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let dom = parse_html(html)?;
            self.convert(&dom)
        }));

        let markdown = match outcome {
            Ok(result) => result?,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic during tree walk".to_string());
                return Err(RenderFailure::new(ConversionError::InternalError(message)));
            }
        };

        if markdown.trim().is_empty() {
            Ok(String::new())
        } else {
            Ok(markdown)
        }
    }

    /// Convert DOM tree to Markdown
    ///
    /// Uses the timeout from [`ConversionOptions::timeout`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use html_markdown_converter::converter::MarkdownConverter;
    /// use html_markdown_converter::parser::parse_html;
    ///
    /// let dom = parse_html("<h1>Hello World</h1><p>This is a test.</p>").expect("Parse failed");
    /// let converter = MarkdownConverter::new();
    /// let markdown = converter.convert(&dom).expect("Conversion failed");
    /// assert!(markdown.contains("# Hello World"));
    /// ```
    pub fn convert(&self, dom: &RcDom) -> Result<String, ConversionError> {
        let mut ctx = ConversionContext::new(self.options.timeout);
        self.convert_with_context(dom, &mut ctx)
    }

    /// Convert DOM tree to Markdown with an explicit context
    ///
    /// # Errors
    ///
    /// - `ConversionError::Timeout` if the context's budget is exceeded
    /// - `ConversionError::InvalidInput` if nesting exceeds the depth limit
    ///
    /// # Examples
    ///
    /// ```rust
    /// use html_markdown_converter::converter::{MarkdownConverter, ConversionContext};
    /// use html_markdown_converter::parser::parse_html;
    /// use std::time::Duration;
    ///
    /// let dom = parse_html("<h1>Hello World</h1>").expect("Parse failed");
    /// let converter = MarkdownConverter::new();
    ///
    /// let mut ctx = ConversionContext::new(Duration::from_secs(5));
    /// let markdown = converter.convert_with_context(&dom, &mut ctx)
    ///     .expect("Conversion failed");
    /// assert!(markdown.contains("# Hello World"));
    /// ```
    pub fn convert_with_context(
        &self,
        dom: &RcDom,
        ctx: &mut ConversionContext,
    ) -> Result<String, ConversionError> {
        let mut output = String::with_capacity(1024);

        // Depth 0 represents the document level
        self.traverse_node(&dom.document, &mut output, 0, ctx)?;

        if !ctx.references.is_empty() {
            output.push_str("\n\n");
            for definition in &ctx.references {
                output.push_str(definition);
                output.push('\n');
            }
        }

        ctx.check_timeout()?;
        let markdown = self.normalize_output(output);
        ctx.check_timeout()?;

        Ok(markdown)
    }

    /// Render every child of `node` into `output`
    ///
    /// Rules use this to obtain the Markdown of an element's content.
    pub fn render_children(
        &self,
        node: &Handle,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        for child in node.children.borrow().iter() {
            self.traverse_node(child, output, depth + 1, ctx)?;
        }
        Ok(())
    }

    /// Traverse a DOM node
    ///
    /// Every node counts towards the timeout checkpoint.
    fn traverse_node(
        &self,
        node: &Handle,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        ctx.increment_and_check()?;

        match node.data {
            NodeData::Document => {
                for child in node.children.borrow().iter() {
                    self.traverse_node(child, output, depth, ctx)?;
                }
            }
            NodeData::Element { ref name, .. } => {
                let tag_name = name.local.as_ref();
                self.handle_element(node, tag_name, output, depth, ctx)?;
            }
            NodeData::Text { ref contents } => {
                let text = contents.borrow();
                let normalized = self.normalize_text(&text);
                let separated = output.is_empty() || output.ends_with(char::is_whitespace);

                if normalized.is_empty() {
                    // Whitespace between inline elements still separates words
                    if !text.is_empty() && !separated {
                        output.push(' ');
                    }
                } else {
                    if text.starts_with(char::is_whitespace) && !separated {
                        output.push(' ');
                    }
                    output.push_str(&normalized);
                    if text.ends_with(char::is_whitespace) {
                        output.push(' ');
                    }
                }
            }
            NodeData::Comment { .. }
            | NodeData::Doctype { .. }
            | NodeData::ProcessingInstruction { .. } => {}
        }

        Ok(())
    }

    /// Handle an HTML element and convert it to Markdown
    fn handle_element(
        &self,
        node: &Handle,
        tag_name: &str,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        if self.security_validator.check_element(tag_name) == SanitizeAction::Remove {
            return Ok(());
        }

        self.security_validator
            .validate_depth(depth)
            .map_err(ConversionError::InvalidInput)?;

        if let Some(rule) = self
            .rules
            .iter()
            .find(|rule| (rule.matches)(node, tag_name, &self.options))
        {
            return (rule.render)(self, node, output, depth, ctx);
        }

        match tag_name {
            "h1" => self.handle_heading(node, 1, output, depth, ctx)?,
            "h2" => self.handle_heading(node, 2, output, depth, ctx)?,
            "h3" => self.handle_heading(node, 3, output, depth, ctx)?,
            "h4" => self.handle_heading(node, 4, output, depth, ctx)?,
            "h5" => self.handle_heading(node, 5, output, depth, ctx)?,
            "h6" => self.handle_heading(node, 6, output, depth, ctx)?,

            "p" => self.handle_paragraph(node, output, depth, ctx)?,
            "blockquote" => self.handle_blockquote(node, output, depth, ctx)?,
            "hr" => {
                ensure_blank_line(output);
                output.push_str(self.options.horizontal_rule);
                output.push_str("\n\n");
            }
            "br" => output.push('\n'),

            "a" => self.handle_link(node, output, depth, ctx)?,
            "img" => self.handle_image(node, output),

            "ul" => self.handle_list(node, output, false, depth, ctx)?,
            "ol" => self.handle_list(node, output, true, depth, ctx)?,

            "pre" => self.handle_code_block(node, output),
            "code" => self.handle_inline_code(node, output),

            "strong" | "b" => {
                self.wrap_inline(node, self.options.strong_delimiter, output, depth, ctx)?
            }
            "em" | "i" => self.wrap_inline(node, self.options.em_delimiter, output, depth, ctx)?,

            // GFM extensions
            "del" | "s" | "strike" if self.is_gfm() => {
                self.wrap_inline(node, "~~", output, depth, ctx)?
            }
            "table" if self.is_gfm() => self.handle_table(node, output, depth, ctx)?,
            "input" => {
                if self.is_gfm()
                    && element_attribute(node, "type")
                        .is_some_and(|kind| kind.eq_ignore_ascii_case("checkbox"))
                {
                    if element_attribute(node, "checked").is_some() {
                        output.push_str("[x] ");
                    } else {
                        output.push_str("[ ] ");
                    }
                }
            }

            // Default: process as container
            _ => self.render_children(node, output, depth, ctx)?,
        }

        Ok(())
    }

    fn is_gfm(&self) -> bool {
        self.options.flavor == MarkdownFlavor::GitHubFlavoredMarkdown
    }

    /// Headings are single-line; empty headings are dropped
    fn handle_heading(
        &self,
        node: &Handle,
        level: usize,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        let mut content = String::new();
        self.render_children(node, &mut content, depth, ctx)?;
        let content = self.normalize_text(&content);
        if content.is_empty() {
            return Ok(());
        }

        ensure_blank_line(output);
        for _ in 0..level {
            output.push('#');
        }
        output.push(' ');
        output.push_str(&content);
        output.push_str("\n\n");

        Ok(())
    }

    fn handle_paragraph(
        &self,
        node: &Handle,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        ensure_blank_line(output);

        let start_len = output.len();
        self.render_children(node, output, depth, ctx)?;

        if output.len() > start_len {
            output.push_str("\n\n");
        }

        Ok(())
    }

    fn handle_blockquote(
        &self,
        node: &Handle,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        let mut content = String::new();
        self.render_children(node, &mut content, depth, ctx)?;
        let content = content.trim();
        if content.is_empty() {
            return Ok(());
        }

        ensure_blank_line(output);
        for line in content.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                output.push_str(">\n");
            } else {
                output.push_str("> ");
                output.push_str(line);
                output.push('\n');
            }
        }
        output.push('\n');

        Ok(())
    }

    /// Built-in link handler
    ///
    /// Reached for anchors without a non-empty `href`, and for every anchor when the
    /// converter writes referenced links. Links with an unsafe target
    /// degrade to their text.
    fn handle_link(
        &self,
        node: &Handle,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        let mut content = String::new();
        self.render_children(node, &mut content, depth, ctx)?;
        let text = content.trim();

        let href = element_attribute(node, "href");
        let Some(href) = href
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .and_then(|h| self.security_validator.sanitize_url(h))
        else {
            output.push_str(text);
            return Ok(());
        };
        if text.is_empty() {
            return Ok(());
        }

        let title = element_attribute(node, "title").filter(|t| !t.is_empty());

        match self.options.link_style {
            LinkStyle::Inlined => {
                output.push('[');
                output.push_str(text);
                output.push(']');
                push_destination(output, href, title.as_deref());
            }
            LinkStyle::Referenced => {
                let label = match self.options.link_reference_style {
                    LinkReferenceStyle::Full => {
                        let id = (ctx.references.len() + 1).to_string();
                        output.push('[');
                        output.push_str(text);
                        output.push_str("][");
                        output.push_str(&id);
                        output.push(']');
                        id
                    }
                    LinkReferenceStyle::Collapsed => {
                        output.push('[');
                        output.push_str(text);
                        output.push_str("][]");
                        text.to_string()
                    }
                    LinkReferenceStyle::Shortcut => {
                        output.push('[');
                        output.push_str(text);
                        output.push(']');
                        text.to_string()
                    }
                };

                let mut definition = format!("[{label}]: {href}");
                if let Some(title) = title.as_deref() {
                    definition.push_str(" \"");
                    definition.push_str(&escape_title(title));
                    definition.push('"');
                }
                ctx.references.push(definition);
            }
        }

        Ok(())
    }

    /// Built-in image handler: `![alt](src "title")`, skipped without a `src`
    fn handle_image(&self, node: &Handle, output: &mut String) {
        let Some(src) = element_attribute(node, "src") else {
            return;
        };
        let src = src.trim();
        if src.is_empty() {
            return;
        }

        let alt = element_attribute(node, "alt").unwrap_or_default();
        let title = element_attribute(node, "title").filter(|t| !t.is_empty());

        output.push_str("![");
        output.push_str(alt.trim());
        output.push(']');
        push_destination(output, src, title.as_deref());
    }

    /// Handle list elements (ul/ol)
    ///
    /// Top-level lists are separated by blank lines; nested lists only start
    /// on a new line so the enclosing item stays tight.
    fn handle_list(
        &self,
        node: &Handle,
        output: &mut String,
        ordered: bool,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        let nested = ctx.list_depth > 0;
        if nested {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
        } else {
            ensure_blank_line(output);
        }

        let mut number = element_attribute(node, "start")
            .and_then(|start| start.trim().parse::<usize>().ok())
            .unwrap_or(1);

        ctx.list_depth += 1;
        for child in node.children.borrow().iter() {
            if let NodeData::Element { ref name, .. } = child.data
                && name.local.as_ref() == "li"
            {
                let marker = if ordered {
                    let marker = format!("{number}. ");
                    number += 1;
                    marker
                } else {
                    format!("{} ", self.options.bullet_list_marker)
                };
                self.handle_list_item(child, &marker, output, depth, ctx)?;
            }
        }
        ctx.list_depth -= 1;

        if !nested {
            output.push('\n');
        }

        Ok(())
    }

    /// Write one list item; continuation lines are indented to the marker width
    fn handle_list_item(
        &self,
        node: &Handle,
        marker: &str,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        ctx.increment_and_check()?;

        let mut content = String::new();
        self.render_children(node, &mut content, depth, ctx)?;
        let content = content.trim();

        let indent = " ".repeat(marker.len());
        output.push_str(marker);
        for (index, line) in content.lines().enumerate() {
            if index > 0 {
                output.push('\n');
                if !line.trim().is_empty() {
                    output.push_str(&indent);
                }
            }
            output.push_str(line.trim_end());
        }
        output.push('\n');

        Ok(())
    }

    /// Handle code block elements (pre)
    ///
    /// Code is copied verbatim. The language comes from a `language-*` or
    /// `lang-*` class on the inner `code` element or on `pre` itself.
    fn handle_code_block(&self, node: &Handle, output: &mut String) {
        ensure_blank_line(output);

        let mut code = String::new();
        extract_code_content(node, &mut code);
        let code = code.strip_suffix('\n').unwrap_or(&code);

        match self.options.code_block_style {
            CodeBlockStyle::Fenced => {
                output.push_str("```");
                if let Some(language) = code_language(node) {
                    output.push_str(&language);
                }
                output.push('\n');
                output.push_str(code);
                if !code.is_empty() {
                    output.push('\n');
                }
                output.push_str("```\n\n");
            }
            CodeBlockStyle::Indented => {
                for line in code.lines() {
                    output.push_str("    ");
                    output.push_str(line);
                    output.push('\n');
                }
                output.push('\n');
            }
        }
    }

    /// Handle inline code; the fence grows when the code itself has backticks
    fn handle_inline_code(&self, node: &Handle, output: &mut String) {
        let mut code = String::new();
        extract_code_content(node, &mut code);

        if code.contains('`') {
            output.push_str("`` ");
            output.push_str(&code);
            output.push_str(" ``");
        } else {
            output.push('`');
            output.push_str(&code);
            output.push('`');
        }
    }

    /// Wrap rendered content in `delimiter`, keeping surrounding whitespace outside
    fn wrap_inline(
        &self,
        node: &Handle,
        delimiter: &str,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        let mut content = String::new();
        self.render_children(node, &mut content, depth, ctx)?;
        let trimmed = content.trim();
        let separated = output.is_empty() || output.ends_with(char::is_whitespace);
        if trimmed.is_empty() {
            if !content.is_empty() && !separated {
                output.push(' ');
            }
            return Ok(());
        }

        let (leading, trailing) = edge_whitespace(node);
        if (leading || content.starts_with(char::is_whitespace)) && !separated {
            output.push(' ');
        }
        output.push_str(delimiter);
        output.push_str(trimmed);
        output.push_str(delimiter);
        if trailing || content.ends_with(char::is_whitespace) {
            output.push(' ');
        }

        Ok(())
    }

    /// Handle table elements (GFM only)
    ///
    /// The first row becomes the header row whether it uses `th` or `td`.
    /// Alignment is read from the header cells' `align` or `style`
    /// attribute. Short rows are padded with empty cells.
    fn handle_table(
        &self,
        node: &Handle,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        let mut rows: Vec<Vec<(String, TableAlignment)>> = Vec::new();
        self.collect_table_rows(node, &mut rows, depth, ctx)?;

        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return Ok(());
        }

        ensure_blank_line(output);

        let header = &rows[0];
        write_table_row(output, header.iter().map(|(cell, _)| cell.as_str()), columns);

        output.push('|');
        for column in 0..columns {
            let alignment = header
                .get(column)
                .map(|(_, alignment)| *alignment)
                .unwrap_or(TableAlignment::Left);
            output.push_str(match alignment {
                TableAlignment::Left => " --- |",
                TableAlignment::Center => " :---: |",
                TableAlignment::Right => " ---: |",
            });
        }
        output.push('\n');

        for row in &rows[1..] {
            write_table_row(output, row.iter().map(|(cell, _)| cell.as_str()), columns);
        }
        output.push('\n');

        Ok(())
    }

    fn collect_table_rows(
        &self,
        node: &Handle,
        rows: &mut Vec<Vec<(String, TableAlignment)>>,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        for child in node.children.borrow().iter() {
            let NodeData::Element { ref name, .. } = child.data else {
                continue;
            };
            match name.local.as_ref() {
                "thead" | "tbody" | "tfoot" => {
                    self.collect_table_rows(child, rows, depth + 1, ctx)?
                }
                "tr" => {
                    let mut cells = Vec::new();
                    for cell in child.children.borrow().iter() {
                        let NodeData::Element { ref name, .. } = cell.data else {
                            continue;
                        };
                        if !matches!(name.local.as_ref(), "td" | "th") {
                            continue;
                        }
                        let mut content = String::new();
                        self.render_children(cell, &mut content, depth + 2, ctx)?;
                        let content = self.normalize_text(&content).replace('|', "\\|");
                        cells.push((content, cell_alignment(cell)));
                    }
                    if !cells.is_empty() {
                        rows.push(cells);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Normalize text content
    ///
    /// Collapses consecutive whitespace (spaces, tabs, newlines) to single
    /// spaces and trims both ends.
    ///
    /// ```text
    /// "  multiple   spaces  " -> "multiple spaces"
    /// "line\nbreak" -> "line break"
    /// ```
    fn normalize_text(&self, text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Normalize final output for deterministic Markdown generation
    ///
    /// **Normalization Rules:**
    /// 1. **Line Endings**: Enforce LF (`\n`) only, never CRLF (`\r\n`)
    /// 2. **Blank Lines**: Collapse consecutive blank lines to single blank line
    /// 3. **Trailing Whitespace**: Remove trailing whitespace from all lines
    /// 4. **Whitespace**: Collapse consecutive spaces outside code
    /// 5. **Final Newline**: Ensure exactly one newline at end of file
    ///
    /// ```text
    /// "Line 1\r\n\r\n\r\nLine 2  \n" -> "Line 1\n\nLine 2\n"
    /// ```
    fn normalize_output(&self, output: String) -> String {
        let output = output.replace("\r\n", "\n");

        let mut result = String::with_capacity(output.len());
        let mut prev_blank = true;
        let mut in_code_block = false;

        for line in output.lines() {
            let fence = line.trim_start().starts_with("```");
            let trimmed = line.trim_end();

            if trimmed.is_empty() && !in_code_block {
                if !prev_blank {
                    result.push('\n');
                    prev_blank = true;
                }
            } else {
                if in_code_block || fence {
                    result.push_str(trimmed);
                } else {
                    result.push_str(&self.normalize_line_whitespace(trimmed));
                }
                result.push('\n');
                prev_blank = false;
            }

            if fence {
                in_code_block = !in_code_block;
            }
        }

        while result.ends_with("\n\n") {
            result.pop();
        }
        if !result.ends_with('\n') {
            result.push('\n');
        }

        result
    }

    /// Collapse runs of spaces in one line
    ///
    /// Leading spaces (list indentation) and spaces inside inline code are
    /// kept as-is.
    fn normalize_line_whitespace(&self, line: &str) -> String {
        let mut result = String::with_capacity(line.len());
        let mut prev_space = false;
        let mut at_start = true;
        let mut in_inline_code = false;

        for ch in line.chars() {
            if ch == '`' {
                in_inline_code = !in_inline_code;
                result.push(ch);
                prev_space = false;
                at_start = false;
            } else if ch == ' ' {
                if in_inline_code || at_start || !prev_space {
                    result.push(ch);
                }
                prev_space = true;
            } else {
                result.push(ch);
                prev_space = false;
                at_start = false;
            }
        }

        result
    }
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// Value of the first attribute called `name`
pub fn element_attribute(node: &Handle, name: &str) -> Option<String> {
    let NodeData::Element { ref attrs, .. } = node.data else {
        return None;
    };
    attrs
        .borrow()
        .iter()
        .find(|attr| attr.name.local.as_ref() == name)
        .map(|attr| attr.value.to_string())
}

/// Write `(url)` or `(url "title")`
pub(crate) fn push_destination(output: &mut String, url: &str, title: Option<&str>) {
    output.push('(');
    output.push_str(url);
    if let Some(title) = title {
        output.push_str(" \"");
        output.push_str(&escape_title(title));
        output.push('"');
    }
    output.push(')');
}

fn escape_title(title: &str) -> String {
    title.replace('"', "\\\"")
}

/// Start a new block: the buffer ends with a blank line, or is empty
fn ensure_blank_line(output: &mut String) {
    if output.is_empty() || output.ends_with("\n\n") {
        return;
    }
    if output.ends_with('\n') {
        output.push('\n');
    } else {
        output.push_str("\n\n");
    }
}

/// Whether the first and last children are text starting/ending with whitespace
fn edge_whitespace(node: &Handle) -> (bool, bool) {
    let children = node.children.borrow();
    let text_edge = |child: Option<&Handle>, leading: bool| {
        child.is_some_and(|child| match child.data {
            NodeData::Text { ref contents } => {
                let text = contents.borrow();
                if leading {
                    text.starts_with(char::is_whitespace)
                } else {
                    text.ends_with(char::is_whitespace)
                }
            }
            _ => false,
        })
    };
    (
        text_edge(children.first(), true),
        text_edge(children.last(), false),
    )
}

/// Copy text content verbatim, without any whitespace normalization
fn extract_code_content(node: &Handle, output: &mut String) {
    match node.data {
        NodeData::Text { ref contents } => output.push_str(&contents.borrow()),
        NodeData::Element { ref name, .. } => {
            if name.local.as_ref() == "br" {
                output.push('\n');
            }
            for child in node.children.borrow().iter() {
                extract_code_content(child, output);
            }
        }
        _ => {}
    }
}

fn language_from_class(class: &str) -> Option<String> {
    class.split_whitespace().find_map(|class| {
        class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
            .filter(|lang| !lang.is_empty())
            .map(str::to_string)
    })
}

fn code_language(pre: &Handle) -> Option<String> {
    let from_code = pre.children.borrow().iter().find_map(|child| {
        if let NodeData::Element { ref name, .. } = child.data
            && name.local.as_ref() == "code"
        {
            element_attribute(child, "class").and_then(|class| language_from_class(&class))
        } else {
            None
        }
    });
    from_code.or_else(|| element_attribute(pre, "class").and_then(|c| language_from_class(&c)))
}

fn cell_alignment(cell: &Handle) -> TableAlignment {
    let parse = |value: &str| match value.trim() {
        "center" => Some(TableAlignment::Center),
        "right" => Some(TableAlignment::Right),
        "left" => Some(TableAlignment::Left),
        _ => None,
    };

    if let Some(align) = element_attribute(cell, "align") {
        return parse(&align.to_lowercase()).unwrap_or(TableAlignment::Left);
    }

    if let Some(style) = element_attribute(cell, "style") {
        let style = style.to_lowercase();
        let declared = style
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .find(|(property, _)| property.trim() == "text-align")
            .and_then(|(_, value)| parse(value));
        if let Some(alignment) = declared {
            return alignment;
        }
    }

    TableAlignment::Left
}

fn write_table_row<'a>(output: &mut String, cells: impl Iterator<Item = &'a str>, columns: usize) {
    output.push('|');
    let mut written = 0;
    for cell in cells.take(columns) {
        output.push(' ');
        output.push_str(cell);
        output.push_str(" |");
        written += 1;
    }
    for _ in written..columns {
        output.push_str(" |");
    }
    output.push('\n');
}
