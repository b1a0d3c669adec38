#![no_main]

use html_markdown_converter::MarkdownConverter;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let html = String::from_utf8_lossy(data);
    let converter = MarkdownConverter::new();

    // Failures are fine, panics are not: render_html reports them as InternalError
    if let Err(failure) = converter.render_html(&html) {
        assert!(
            !matches!(
                failure.cause(),
                html_markdown_converter::ConversionError::InternalError(_)
            ),
            "renderer panicked: {failure:?}"
        );
    }
});
