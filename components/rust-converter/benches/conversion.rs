//! Benchmarks for the fallback renderer and the post-processing pass.

#![allow(clippy::format_push_string)] // Benchmark setup code, performance not critical

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use html_markdown_converter::MarkdownConverter;
use html_markdown_converter::lazy_image::normalize_lazy_images;
use html_markdown_converter::postprocess::postprocess_markdown;

/// Generate an article-like page with `sections` headed sections.
fn generate_article(sections: usize) -> String {
    let mut html = String::from("<html><body><article><h1>Article</h1>");
    for i in 0..sections {
        html.push_str(&format!("<h2>Section {i}</h2>"));
        html.push_str(&format!(
            "<p>Paragraph {i} with <strong>bold</strong>, <em>italic</em> and a \
             <a href=\"https://example.com/{i}\" title=\"Item {i}\">link</a>.</p>"
        ));
        html.push_str(&format!(
            "<p><img class=\"rich_pages wxw-img\" src=\"data:image/svg+xml,%3Csvg%3E\" \
             data-src=\"https://mmbiz.qpic.cn/{i}.png?wx_fmt=png&wx_lazy=1\" alt=\"figure {i}\"></p>"
        ));
        html.push_str("<ul><li>first</li><li>second <code>inline</code></li></ul>");
    }
    html.push_str("</article></body></html>");
    html
}

fn bench_render_simple(c: &mut Criterion) {
    let converter = MarkdownConverter::new();
    let html = "<h1>Hello</h1><p>Simple <a href=\"/x\">content</a>.</p>";

    c.bench_function("render_simple_page", |b| {
        b.iter(|| converter.render_html(html));
    });
}

fn bench_render_varying_sizes(c: &mut Criterion) {
    let converter = MarkdownConverter::new();
    let mut group = c.benchmark_group("render_article");

    for sections in [10, 100, 500] {
        let html = generate_article(sections);
        group.throughput(Throughput::Bytes(html.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sections), &html, |b, html| {
            b.iter(|| converter.render_html(html));
        });
    }

    group.finish();
}

fn bench_normalize_lazy_images(c: &mut Criterion) {
    let html = generate_article(100);

    c.bench_function("normalize_lazy_images_100_sections", |b| {
        b.iter(|| normalize_lazy_images(&html));
    });
}

fn bench_postprocess(c: &mut Criterion) {
    let converter = MarkdownConverter::new();
    let markdown = converter
        .render_html(&generate_article(100))
        .unwrap_or_default();

    c.bench_function("postprocess_100_sections", |b| {
        b.iter(|| postprocess_markdown(&markdown));
    });
}

criterion_group!(
    benches,
    bench_render_simple,
    bench_render_varying_sizes,
    bench_normalize_lazy_images,
    bench_postprocess
);
criterion_main!(benches);
