//! Fallback render budget
//!
//! The renderer reads the clock only every 100 nodes, so an expired budget
//! is noticed at the next checkpoint and never before it.

use std::time::Duration;

use html_markdown_converter::converter::{ConversionContext, ConversionOptions, MarkdownConverter};
use html_markdown_converter::error::ConversionError;

#[test]
fn test_expired_budget_fires_at_node_checkpoint() {
    let mut ctx = ConversionContext::new(Duration::from_nanos(1));
    std::thread::sleep(Duration::from_millis(1));

    for node in 1..100 {
        assert!(ctx.increment_and_check().is_ok(), "checked early at node {node}");
    }
    assert!(matches!(ctx.increment_and_check(), Err(ConversionError::Timeout)));
    assert_eq!(ctx.node_count(), 100);

    let expired = MarkdownConverter::with_options(ConversionOptions {
        timeout: Duration::from_nanos(1),
        ..Default::default()
    });

    // Too few nodes to reach a checkpoint
    assert_eq!(expired.render_html("<p>short</p>").expect("render"), "short\n");

    let long_feed: String = (0..300).map(|i| format!("<p>item {i}</p>")).collect();
    let failure = expired.render_html(&long_feed).expect_err("budget expired");
    assert!(matches!(failure.cause(), ConversionError::Timeout));
}
