//! HTML Markdown Converter
//!
//! Converts HTML pages (news articles, blog posts, WeChat public-account
//! posts) into Markdown. Two backends exist:
//!
//! - a native component, loaded from a shared library when enabled
//! - a rule-based renderer built on html5ever, always available
//!
//! [`parse_markdown`] tries them in that order, post-processes the result,
//! and never fails: when nothing can be converted it returns `""`.
//!
//! # Architecture
//!
//! The library is structured into several modules:
//! - `selector`: backend selection and the process-wide service
//! - `config`: environment configuration
//! - `bridge`: lazily loaded native component, called off the async runtime
//! - `parser`: HTML5 parsing using html5ever
//! - `converter`: Markdown generation from the DOM tree
//! - `rules`: rule overrides consulted before the built-in tag handlers
//! - `lazy_image`: lazy-load image resolution shared by both backends
//! - `postprocess`: text transforms applied to every result
//! - `security`: element removal, URL sanitization, depth limits
//! - `telemetry`: error reporting seam
//! - `ffi`: C ABI export, making this crate a native component itself
//!
//! # Example
//!
//! ```rust
//! use html_markdown_converter::{MarkdownConverter, parse_html};
//!
//! let dom = parse_html("<p>Hello <strong>world</strong></p>").unwrap();
//! let markdown = MarkdownConverter::new().convert(&dom).unwrap();
//! assert_eq!(markdown, "Hello **world**\n");
//! ```

pub mod bridge;
pub mod config;
pub mod converter;
pub mod error;
pub mod ffi;
pub mod lazy_image;
pub mod parser;
pub mod postprocess;
pub mod rules;
pub mod security;
pub mod selector;
pub mod telemetry;

pub use bridge::{NativeBridge, NativeComponent};
pub use config::ConverterConfig;
pub use converter::{ConversionOptions, MarkdownConverter};
pub use error::{BridgeError, ConversionError, RenderFailure};
pub use parser::parse_html;
pub use selector::{Backend, ConversionOutcome, MarkdownService, parse_markdown};
pub use telemetry::{ErrorReporter, NoopReporter};
