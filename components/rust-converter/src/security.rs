//! Element and URL policy for scraped HTML
//!
//! Scraped pages are untrusted input. Markdown output carries no attributes,
//! so event handlers disappear on their own; what remains to police is:
//!
//! - **Elements** whose content must never reach the output (scripts,
//!   styles, embedded documents, document metadata)
//! - **URL schemes** that must never become a link target; image sources
//!   pass through untouched so inline `data:image/...` pictures survive
//! - **Nesting depth**, which bounds the recursive tree walk
//!
//! html5ever is an HTML5 parser, not an XML parser: it resolves no external
//! entities, so XXE is not a concern for this crate.

/// Maximum allowed nesting depth for HTML elements
/// Prevents stack overflow from deeply nested structures
const MAX_NESTING_DEPTH: usize = 1000;

/// Elements removed together with all their children
const REMOVED_ELEMENTS: &[&str] = &[
    "script",   // JavaScript execution
    "style",    // CSS, not content
    "noscript", // Alternative content for script-less browsers
    "iframe",   // Embedded documents
    "object",   // Plugins
    "embed",    // Plugins
    "applet",   // Legacy Java applets
    "link",     // External stylesheets
    "base",     // Base URL changes
    "head",     // Title and metadata are not body content
    "template", // Inert markup
];

/// URL schemes never emitted as link targets
const DANGEROUS_URL_SCHEMES: &[&str] = &[
    "javascript:", // JavaScript execution
    "data:",       // Inline documents
    "vbscript:",   // VBScript execution (legacy IE)
    "file:",       // Local file access
    "about:",      // Browser internal URLs
];

/// Action to take when sanitizing an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeAction {
    /// Allow the element as-is
    Allow,
    /// Remove the element and all its children
    Remove,
}

/// Security validator for HTML input
#[derive(Debug, Clone)]
pub struct SecurityValidator {
    /// Maximum allowed nesting depth
    max_depth: usize,
}

impl SecurityValidator {
    /// Create a new security validator with default settings
    pub fn new() -> Self {
        Self {
            max_depth: MAX_NESTING_DEPTH,
        }
    }

    /// Create a security validator with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Check if an element should be removed
    ///
    /// # Examples
    ///
    /// ```
    /// use html_markdown_converter::security::{SecurityValidator, SanitizeAction};
    ///
    /// let validator = SecurityValidator::new();
    /// assert_eq!(validator.check_element("script"), SanitizeAction::Remove);
    /// assert_eq!(validator.check_element("div"), SanitizeAction::Allow);
    /// ```
    pub fn check_element(&self, tag_name: &str) -> SanitizeAction {
        if REMOVED_ELEMENTS.contains(&tag_name) {
            SanitizeAction::Remove
        } else {
            SanitizeAction::Allow
        }
    }

    /// Check if a URL uses a dangerous scheme
    ///
    /// # Examples
    ///
    /// ```
    /// use html_markdown_converter::security::SecurityValidator;
    ///
    /// let validator = SecurityValidator::new();
    /// assert!(validator.is_dangerous_url("javascript:alert('xss')"));
    /// assert!(validator.is_dangerous_url("data:image/svg+xml,%3Csvg%3E"));
    /// assert!(!validator.is_dangerous_url("https://example.com"));
    /// assert!(!validator.is_dangerous_url("/relative/path"));
    /// ```
    pub fn is_dangerous_url(&self, url: &str) -> bool {
        let url_lower = url.trim().to_lowercase();
        DANGEROUS_URL_SCHEMES
            .iter()
            .any(|scheme| url_lower.starts_with(scheme))
    }

    /// Validate nesting depth to prevent stack overflow
    ///
    /// # Examples
    ///
    /// ```
    /// use html_markdown_converter::security::SecurityValidator;
    ///
    /// let validator = SecurityValidator::with_max_depth(100);
    /// assert!(validator.validate_depth(50).is_ok());
    /// assert!(validator.validate_depth(150).is_err());
    /// ```
    pub fn validate_depth(&self, depth: usize) -> Result<(), String> {
        if depth > self.max_depth {
            Err(format!(
                "HTML nesting depth {} exceeds maximum allowed depth {}",
                depth, self.max_depth
            ))
        } else {
            Ok(())
        }
    }

    /// Returns `None` if the URL is dangerous, `Some(url)` if safe
    pub fn sanitize_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        if self.is_dangerous_url(url) {
            None
        } else {
            Some(url)
        }
    }
}

impl Default for SecurityValidator {
    fn default() -> Self {
        Self::new()
    }
}
