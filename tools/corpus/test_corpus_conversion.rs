//! Test corpus conversion validation
//!
//! Converts one HTML file through the same pipeline applications use and
//! prints the Markdown. Backend selection follows the environment
//! (`USE_GO_MARKDOWN_PARSER`, `HTML_TO_MARKDOWN_LIBRARY`); set `RUST_LOG`
//! to see which backend ran.
//!
//! ```text
//! test-corpus-conversion <html_file>
//! ```

use std::env;
use std::fs;
use std::process;

use html_markdown_converter::{ConverterConfig, MarkdownService};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <html_file>", args[0]);
        process::exit(1);
    }

    let filename = &args[1];

    // Read HTML file, tolerating invalid UTF-8
    let html = match fs::read(filename) {
        Ok(content) => String::from_utf8_lossy(&content).into_owned(),
        Err(e) => {
            eprintln!("Error reading file {}: {}", filename, e);
            process::exit(1);
        }
    };

    let service = MarkdownService::new(ConverterConfig::from_env());
    let outcome = service.convert_detailed(Some(&html)).await;

    match outcome.backend() {
        Some(backend) => eprintln!("Converted with {:?} backend", backend),
        None => eprintln!("Nothing converted"),
    }

    // Print result
    print!("{}", outcome.into_markdown());
}
