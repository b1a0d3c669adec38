//! Basic conversion example demonstrating the Markdown converter
//!
//! Run with: cargo run --example basic_conversion
//!
//! Set `USE_GO_MARKDOWN_PARSER=true` to try the native component first.

use html_markdown_converter::converter::{ConversionOptions, LinkStyle, MarkdownConverter};
use html_markdown_converter::parse_markdown;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== HTML Markdown Converter - Basic Examples ===\n");

    let examples: &[(&str, &str)] = &[
        (
            "Simple heading and paragraph",
            "<h1>Welcome</h1><p>This is a test document.</p>",
        ),
        (
            "Links keep their title",
            r#"<p>Hello <a href="http://x.com" title="X">world</a></p>"#,
        ),
        (
            "Lazy-loaded article image",
            r#"<p><img class="rich_pages wxw-img" src="data:image/svg+xml,%3Csvg%3E" data-src="https://mmbiz.qpic.cn/a.png?wx_fmt=png&wx_lazy=1"></p>"#,
        ),
        (
            "Navigation boilerplate is dropped",
            r##"<p><a href="#main">Skip to Content</a></p><h2>Story</h2><p>Body</p>"##,
        ),
        (
            "Script removal (security)",
            "<h1>Title</h1><script>alert('xss')</script><p>Safe content</p>",
        ),
    ];

    for (index, (title, html)) in examples.iter().enumerate() {
        println!("Example {}: {}", index + 1, title);
        println!("Input HTML:\n{}\n", html);
        println!("Output Markdown:\n{}", parse_markdown(Some(html)).await);
        println!("---\n");
    }

    referenced_links();
}

fn referenced_links() {
    println!("Example 6: Referenced links");
    let html = r#"<p>Read the <a href="https://example.com/guide">guide</a> and the <a href="https://example.com/faq">FAQ</a>.</p>"#;
    println!("Input HTML:\n{}\n", html);

    let options = ConversionOptions {
        link_style: LinkStyle::Referenced,
        ..Default::default()
    };
    match MarkdownConverter::with_options(options).render_html(html) {
        Ok(markdown) => println!("Output Markdown:\n{}", markdown),
        Err(failure) => println!("Render failed: {}", failure.cause()),
    }
    println!("---\n");
}
