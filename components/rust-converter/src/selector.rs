//! Backend selection
//!
//! [`MarkdownService`] owns the one conversion pipeline callers see:
//!
//! 1. Absent or empty HTML converts to `""` and no backend runs.
//! 2. With the native backend enabled it is tried first. An artifact that is
//!    not installed is logged as a warning; any other native failure is
//!    reported through the [`ErrorReporter`] and logged as an error.
//! 3. Otherwise, or after a native failure, the rule-based renderer runs.
//!    Its failure is logged and the result is `""`.
//! 4. A successful result from either backend goes through
//!    [`postprocess_markdown`].
//!
//! No error ever crosses the [`MarkdownService::convert`] boundary.

use std::sync::{Arc, LazyLock};

use tracing::{debug, error, warn};

use crate::bridge::NativeBridge;
use crate::config::ConverterConfig;
use crate::converter::MarkdownConverter;
use crate::error::RenderFailure;
use crate::postprocess::postprocess_markdown;
use crate::telemetry::{ErrorReporter, NoopReporter};

/// Which backend produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Native,
    Fallback,
}

/// The detailed result of one conversion
#[derive(Debug)]
pub enum ConversionOutcome {
    /// The input was absent or empty; nothing ran
    Empty,
    /// A backend succeeded; `markdown` is already post-processed
    Converted { markdown: String, backend: Backend },
    /// Every attempted backend failed
    Failed(RenderFailure),
}

impl ConversionOutcome {
    /// The Markdown text, `""` unless a backend succeeded
    pub fn into_markdown(self) -> String {
        match self {
            ConversionOutcome::Converted { markdown, .. } => markdown,
            ConversionOutcome::Empty | ConversionOutcome::Failed(_) => String::new(),
        }
    }

    pub fn backend(&self) -> Option<Backend> {
        match self {
            ConversionOutcome::Converted { backend, .. } => Some(*backend),
            _ => None,
        }
    }
}

/// HTML to Markdown conversion with native-first backend selection
#[derive(Debug)]
pub struct MarkdownService {
    config: ConverterConfig,
    bridge: Option<NativeBridge>,
    converter: MarkdownConverter,
    reporter: Arc<dyn ErrorReporter>,
}

impl MarkdownService {
    /// Service for `config`, with a shared-library bridge when the native backend is enabled
    pub fn new(config: ConverterConfig) -> Self {
        let bridge = config
            .use_native
            .then(|| NativeBridge::new(config.library_path.clone(), config.native_timeout));

        Self {
            config,
            bridge,
            converter: MarkdownConverter::new(),
            reporter: Arc::new(NoopReporter),
        }
    }

    /// Replace the native bridge
    ///
    /// The bridge is only consulted while `use_native` is set.
    pub fn with_bridge(mut self, bridge: NativeBridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn with_reporter(mut self, reporter: impl ErrorReporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Replace the fallback renderer
    pub fn with_converter(mut self, converter: MarkdownConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Convert `html` to Markdown; `""` when there is nothing to convert or every backend fails
    pub async fn convert(&self, html: Option<&str>) -> String {
        self.convert_detailed(html).await.into_markdown()
    }

    /// Convert `html` and report which backend produced the result
    pub async fn convert_detailed(&self, html: Option<&str>) -> ConversionOutcome {
        let Some(html) = html.filter(|html| !html.is_empty()) else {
            return ConversionOutcome::Empty;
        };

        if self.config.use_native
            && let Some(bridge) = &self.bridge
        {
            match bridge.convert(html).await {
                Ok(markdown) => {
                    debug!(target = "html_markdown", backend = "native", "converted html");
                    return ConversionOutcome::Converted {
                        markdown: postprocess_markdown(&markdown),
                        backend: Backend::Native,
                    };
                }
                Err(err) if err.is_unavailable() => {
                    warn!(
                        target = "html_markdown",
                        path = %bridge.resolved_path().display(),
                        "native markdown component is not installed, using fallback renderer"
                    );
                }
                Err(err) => {
                    self.reporter.report(&err);
                    error!(
                        target = "html_markdown",
                        error = %err,
                        "native markdown conversion failed, using fallback renderer"
                    );
                }
            }
        }

        match self.converter.render_html(html) {
            Ok(markdown) => {
                debug!(target = "html_markdown", backend = "fallback", "converted html");
                ConversionOutcome::Converted {
                    markdown: postprocess_markdown(&markdown),
                    backend: Backend::Fallback,
                }
            }
            Err(failure) => {
                error!(
                    target = "html_markdown",
                    error = %failure,
                    cause = %failure.cause(),
                    "fallback markdown renderer failed"
                );
                ConversionOutcome::Failed(failure)
            }
        }
    }
}

static SERVICE: LazyLock<MarkdownService> =
    LazyLock::new(|| MarkdownService::new(ConverterConfig::from_env()));

/// Convert HTML to Markdown with the process-wide service
///
/// The configuration is read from the environment on first use. The result
/// is `""` for absent or empty input and when no backend can convert it.
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let markdown = html_markdown_converter::parse_markdown(Some("<h1>Title</h1>")).await;
/// assert_eq!(markdown, "# Title\n");
/// # }
/// ```
pub async fn parse_markdown(html: Option<&str>) -> String {
    SERVICE.convert(html).await
}
