#![no_main]

use std::ffi::CString;

use html_markdown_converter::ffi::{ConvertHTMLToMarkdown, FreeCString};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let bytes: Vec<u8> = data.iter().copied().filter(|&b| b != 0).collect();
    let Ok(input) = CString::new(bytes) else {
        return;
    };

    let markdown = unsafe { ConvertHTMLToMarkdown(input.as_ptr()) };
    assert!(!markdown.is_null(), "non-NULL input must not yield NULL");
    unsafe { FreeCString(markdown) };
});
