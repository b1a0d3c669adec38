//! Error types for conversion operations
//!
//! Three families of errors exist, one per stage that can fail:
//!
//! - [`ConversionError`]: raised inside the rule-based renderer (parse, tree
//!   walk, cooperative timeout)
//! - [`BridgeError`]: raised by the native renderer bridge
//! - [`RenderFailure`]: the fallback renderer's terminal failure, wrapping
//!   the `ConversionError` that caused it
//!
//! None of them ever reaches the caller of
//! [`parse_markdown`](crate::parse_markdown); the backend selector turns
//! each one into a fallback attempt or an empty result.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during HTML to Markdown conversion
#[derive(Debug, Error)]
pub enum ConversionError {
    /// HTML parsing failed
    #[error("Parse error: {0}")]
    ParseError(String),
    /// Conversion timeout exceeded
    #[error("Conversion timeout exceeded")]
    Timeout,
    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Errors reported by the native renderer bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The shared library artifact does not exist on disk.
    ///
    /// This is an expected operational condition (the component simply is
    /// not installed), not a failure.
    #[error("native markdown component not found at {}", path.display())]
    ComponentUnavailable { path: PathBuf },

    /// The artifact exists but could not be loaded or lacks the expected symbol
    #[error("failed to load native markdown component from {}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// The native side failed while converting
    #[error("native markdown conversion failed: {0}")]
    Invocation(String),

    /// The native call did not return within the configured bound
    #[error("native markdown conversion did not finish within {0:?}")]
    Timeout(Duration),
}

impl BridgeError {
    /// Returns true for the expected "component not installed" condition
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BridgeError::ComponentUnavailable { .. })
    }
}

/// Terminal failure of the rule-based fallback renderer
#[derive(Debug, Error)]
#[error("fallback markdown renderer failed")]
pub struct RenderFailure {
    #[source]
    source: ConversionError,
}

impl RenderFailure {
    pub fn new(source: ConversionError) -> Self {
        Self { source }
    }

    /// The error that aborted the tree walk
    pub fn cause(&self) -> &ConversionError {
        &self.source
    }
}

impl From<ConversionError> for RenderFailure {
    fn from(source: ConversionError) -> Self {
        Self::new(source)
    }
}
