//! The bound on native conversions
//!
//! Run with: cargo run --example native_timeout
//!
//! A stand-in component plays the native library so no shared object is
//! needed. Set `HTML_TO_MARKDOWN_NATIVE_TIMEOUT_MS` to change the bound
//! (this demo uses 200 ms when it is unset, `0` disables it).

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use html_markdown_converter::config::NATIVE_TIMEOUT_ENV;
use html_markdown_converter::{
    BridgeError, ConverterConfig, MarkdownService, NativeBridge, NativeComponent,
};
use tracing_subscriber::EnvFilter;

/// Answers after `delay`, like a native library stuck on a large page
struct StandIn {
    delay: Duration,
}

impl NativeComponent for StandIn {
    fn convert(&self, html: &str) -> Result<String, BridgeError> {
        std::thread::sleep(self.delay);
        Ok(format!("native saw {} bytes\n", html.len()))
    }
}

fn stand_in_bridge(artifact: &Path, bound: Duration, delay: Duration) -> NativeBridge {
    NativeBridge::with_loader(artifact, bound, move |_path| {
        Ok(Arc::new(StandIn { delay }) as Arc<dyn NativeComponent>)
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ConverterConfig {
        use_native: true,
        ..ConverterConfig::from_lookup(|name| {
            std::env::var(name)
                .ok()
                .or_else(|| (name == NATIVE_TIMEOUT_ENV).then(|| "200".to_string()))
        })
    };
    let bound = config.native_timeout;
    println!("=== Native conversion bound: {bound:?} ===\n");

    // The bridge only loads an artifact that exists on disk
    let artifact = tempfile::NamedTempFile::new()?;
    let html = "<h1>Report</h1><p>Quarterly numbers</p>";

    println!("1. Component answers within the bound");
    let fast = stand_in_bridge(artifact.path(), bound, Duration::from_millis(10));
    let started = Instant::now();
    println!("   {:?} after {:?}\n", fast.convert(html).await, started.elapsed());

    println!("2. Component stalls past the bound");
    let stalled = stand_in_bridge(artifact.path(), bound, bound + Duration::from_millis(300));
    let started = Instant::now();
    match stalled.convert(html).await {
        Err(BridgeError::Timeout(limit)) => {
            println!("   gave up after {:?} (bound {limit:?})", started.elapsed())
        }
        other => println!("   {other:?} after {:?}", started.elapsed()),
    }
    println!("   handle still loaded: {}\n", stalled.is_loaded());

    println!("3. The service falls back when the bound expires");
    let service = MarkdownService::new(config).with_bridge(stand_in_bridge(
        artifact.path(),
        bound,
        bound + Duration::from_millis(300),
    ));
    let outcome = service.convert_detailed(Some(html)).await;
    println!("   backend: {:?}", outcome.backend());
    println!("   markdown:\n{}", outcome.into_markdown());

    Ok(())
}
