//! Error reporting seam
//!
//! Unexpected backend failures are handed to an [`ErrorReporter`] in
//! addition to being logged. Delivering them (to an error tracker, a queue,
//! ...) is the embedding application's business; the crate only defines
//! the seam and a no-op default.

use std::error::Error;
use std::fmt::Debug;

/// Receives unexpected conversion errors
pub trait ErrorReporter: Send + Sync + Debug {
    fn report(&self, error: &(dyn Error + 'static));
}

/// Discards every report
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ErrorReporter for NoopReporter {
    fn report(&self, _error: &(dyn Error + 'static)) {}
}
