#![no_main]

use html_markdown_converter::postprocess::escape_multiline_links;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let markdown = String::from_utf8_lossy(data);
    let escaped = escape_multiline_links(&markdown);

    // Escaping only ever inserts a backslash before a newline
    assert_eq!(escaped.matches('\n').count(), markdown.matches('\n').count());
    assert!(escaped.len() >= markdown.len());
});
