//! C ABI export of the rule-based renderer
//!
//! Built as a `cdylib`, this crate is itself a drop-in native component:
//! it exports the same two symbols [`crate::bridge::SharedLibrary`] loads.
//!
//! ```c
//! char *ConvertHTMLToMarkdown(const char *html);
//! void FreeCString(char *markdown);
//! ```
//!
//! # FFI Boundary Contract
//!
//! ## String Representation
//!
//! Unlike a length-prefixed buffer API, both directions use NUL-terminated
//! C strings. Input that is not valid UTF-8 is decoded lossily (invalid
//! sequences become U+FFFD). The output is always valid UTF-8.
//!
//! ## Memory Management
//!
//! - Rust allocates every returned string with [`CString::into_raw`]
//! - The caller must release it exactly once with `FreeCString`
//! - Releasing it with C `free()` is undefined behavior (allocator mismatch)
//!
//! ```rust
//! use std::ffi::{CStr, CString};
//! use html_markdown_converter::ffi::{ConvertHTMLToMarkdown, FreeCString};
//!
//! let html = CString::new("<h1>Hello</h1>").unwrap();
//! let markdown = unsafe { ConvertHTMLToMarkdown(html.as_ptr()) };
//! assert!(!markdown.is_null());
//! assert_eq!(unsafe { CStr::from_ptr(markdown) }.to_str().unwrap(), "# Hello\n");
//! unsafe { FreeCString(markdown) };
//! ```
//!
//! ## Error Handling Contract
//!
//! The component never reports errors as such:
//!
//! - NULL input returns NULL
//! - A render error (depth limit, empty page) returns an empty string
//! - A panic is caught and returns NULL; Rust never unwinds into C
//!
//! ## Thread Safety
//!
//! Both functions are thread-safe. The converter they share is immutable.

use std::ffi::{CStr, CString, c_char};
use std::panic;
use std::ptr;
use std::sync::LazyLock;

use crate::converter::MarkdownConverter;
use crate::lazy_image::normalize_lazy_images;

static CONVERTER: LazyLock<MarkdownConverter> = LazyLock::new(MarkdownConverter::new);

fn convert_inner(html: &str) -> String {
    let html = normalize_lazy_images(html);
    CONVERTER.render_html(&html).unwrap_or_default()
}

/// Convert a NUL-terminated HTML string to Markdown
///
/// # Parameters
///
/// - `html`: NUL-terminated input, may be NULL
///
/// # Returns
///
/// - NULL when `html` is NULL or the conversion panicked
/// - Otherwise a NUL-terminated Markdown string, empty when the page
///   renders to nothing or cannot be rendered
///
/// The returned string must be released with [`FreeCString`].
///
/// # Safety
///
/// `html` must be NULL or point to a NUL-terminated buffer that stays
/// valid and unmodified for the duration of the call.
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub unsafe extern "C" fn ConvertHTMLToMarkdown(html: *const c_char) -> *mut c_char {
    if html.is_null() {
        return ptr::null_mut();
    }

    // SAFETY: `html` is non-NULL and the caller guarantees NUL termination.
    let html = unsafe { CStr::from_ptr(html) }.to_string_lossy();

    let result = panic::catch_unwind(|| convert_inner(&html));

    match result {
        // Markdown decoded from a C string holds no interior NUL
        Ok(markdown) => CString::new(markdown)
            .map(CString::into_raw)
            .unwrap_or(ptr::null_mut()),
        Err(_) => ptr::null_mut(),
    }
}

/// Release a string returned by [`ConvertHTMLToMarkdown`]
///
/// NULL is a no-op.
///
/// # Safety
///
/// `markdown` must be NULL or a pointer obtained from
/// [`ConvertHTMLToMarkdown`] that has not been released yet. The pointer is
/// invalid after the call.
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub unsafe extern "C" fn FreeCString(markdown: *mut c_char) {
    if markdown.is_null() {
        return;
    }

    // SAFETY: `markdown` was created by `CString::into_raw` in
    // `ConvertHTMLToMarkdown` and ownership returns here exactly once.
    unsafe { drop(CString::from_raw(markdown)) };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(html: &str) -> Option<String> {
        let input = CString::new(html).expect("test html has no NUL");
        let raw = unsafe { ConvertHTMLToMarkdown(input.as_ptr()) };
        if raw.is_null() {
            return None;
        }
        let markdown = unsafe { CStr::from_ptr(raw) }
            .to_str()
            .expect("output is UTF-8")
            .to_owned();
        unsafe { FreeCString(raw) };
        Some(markdown)
    }

    #[test]
    fn test_null_input_returns_null() {
        let raw = unsafe { ConvertHTMLToMarkdown(ptr::null()) };
        assert!(raw.is_null());
    }

    #[test]
    fn test_free_null_is_noop() {
        unsafe { FreeCString(ptr::null_mut()) };
    }

    #[test]
    fn test_empty_input_returns_empty_string() {
        assert_eq!(convert("").as_deref(), Some(""));
    }

    #[test]
    fn test_lazy_images_are_resolved() {
        let markdown = convert(
            r#"<p><img data-src="http://x.example/a.png?wx_fmt=png&wx_lazy=1" src="data:image/svg+xml,%3Csvg%3E" alt="a"></p>"#,
        )
        .expect("converted");
        assert_eq!(markdown, "![a](http://x.example/a.png?wx_fmt=png)\n");
    }
}
