//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::error::Error;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use html_markdown_converter::{BridgeError, ErrorReporter, NativeBridge, NativeComponent};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::Registry;

/// Counts WARN and ERROR events and keeps the `path` field of warnings
#[derive(Debug, Clone, Default)]
pub struct LevelCounter {
    warns: Arc<AtomicUsize>,
    errors: Arc<AtomicUsize>,
    warn_paths: Arc<Mutex<Vec<String>>>,
}

impl LevelCounter {
    pub fn warns(&self) -> usize {
        self.warns.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn warn_paths(&self) -> Vec<String> {
        self.warn_paths.lock().expect("warn_paths lock").clone()
    }

    /// Install the counter as the current thread's subscriber
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = Registry::default().with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }
}

impl<S: Subscriber> Layer<S> for LevelCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        match *event.metadata().level() {
            Level::WARN => {
                self.warns.fetch_add(1, Ordering::SeqCst);
                let mut visitor = PathField(None);
                event.record(&mut visitor);
                if let Some(path) = visitor.0 {
                    self.warn_paths.lock().expect("warn_paths lock").push(path);
                }
            }
            Level::ERROR => {
                self.errors.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}

struct PathField(Option<String>);

impl Visit for PathField {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "path" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

/// Counts reported errors
#[derive(Debug, Clone, Default)]
pub struct CountingReporter {
    reports: Arc<AtomicUsize>,
}

impl CountingReporter {
    pub fn reports(&self) -> usize {
        self.reports.load(Ordering::SeqCst)
    }
}

impl ErrorReporter for CountingReporter {
    fn report(&self, _error: &(dyn Error + 'static)) {
        self.reports.fetch_add(1, Ordering::SeqCst);
    }
}

/// Returns the same Markdown for every input
#[derive(Clone)]
pub struct StaticComponent(pub &'static str);

impl NativeComponent for StaticComponent {
    fn convert(&self, _html: &str) -> Result<String, BridgeError> {
        Ok(self.0.to_string())
    }
}

/// Fails every conversion
#[derive(Clone)]
pub struct FailingComponent;

impl NativeComponent for FailingComponent {
    fn convert(&self, _html: &str) -> Result<String, BridgeError> {
        Err(BridgeError::Invocation("component crashed".to_string()))
    }
}

/// Sleeps before answering
#[derive(Clone)]
pub struct SlowComponent(pub Duration);

impl NativeComponent for SlowComponent {
    fn convert(&self, html: &str) -> Result<String, BridgeError> {
        std::thread::sleep(self.0);
        Ok(html.to_string())
    }
}

/// Bridge to `component` that counts loader invocations
///
/// `artifact` must exist for the loader to run.
pub fn counting_bridge<C>(
    artifact: &Path,
    timeout: Duration,
    component: C,
) -> (NativeBridge, Arc<AtomicUsize>)
where
    C: NativeComponent + Clone + 'static,
{
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let bridge = NativeBridge::with_loader(artifact, timeout, move |_path| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(component.clone()) as Arc<dyn NativeComponent>)
    });
    (bridge, loads)
}
