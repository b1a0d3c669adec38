#![no_main]

use html_markdown_converter::lazy_image::normalize_lazy_images;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let html = String::from_utf8_lossy(data);
    let once = normalize_lazy_images(&html);
    let twice = normalize_lazy_images(&once);
    assert_eq!(once, twice, "normalization must be idempotent");
});
