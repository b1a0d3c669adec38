//! Native renderer bridge
//!
//! The native backend is a shared library exporting the C ABI
//!
//! ```c
//! char *ConvertHTMLToMarkdown(const char *html);
//! void FreeCString(char *markdown);   /* optional */
//! ```
//!
//! [`NativeBridge`] loads it lazily, at most once, and exposes it as an
//! async call that never blocks the runtime: both the load and every
//! conversion run on tokio's blocking pool, and conversions are bounded by
//! a timeout.
//!
//! # Lifecycle
//!
//! - First use checks that the artifact exists. A missing artifact is
//!   [`BridgeError::ComponentUnavailable`] and nothing is loaded.
//! - Concurrent first callers serialize on a [`OnceCell`]; exactly one of
//!   them runs the loader.
//! - Failures are not cached. Until a handle exists, every call checks for
//!   the artifact again, so a component installed after startup is picked
//!   up by the next call.
//! - Once created the handle is shared by all calls and never released.
//!
//! # Timeouts
//!
//! An FFI call cannot be cancelled. When the bound expires the caller gets
//! [`BridgeError::Timeout`] and moves on; the blocking thread finishes the
//! call in the background and its result is discarded.

use std::ffi::{CStr, CString, c_char};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use libloading::Library;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::BridgeError;

const CONVERT_SYMBOL: &[u8] = b"ConvertHTMLToMarkdown\0";
const FREE_SYMBOL: &[u8] = b"FreeCString\0";

/// A loaded HTML-to-Markdown component
///
/// `convert` is a blocking call; the bridge always invokes it from the
/// blocking thread pool.
pub trait NativeComponent: Send + Sync {
    fn convert(&self, html: &str) -> Result<String, BridgeError>;
}

type ConvertFn = unsafe extern "C" fn(*const c_char) -> *mut c_char;
type FreeFn = unsafe extern "C" fn(*mut c_char);

/// The native component as a dynamically loaded shared library
pub struct SharedLibrary {
    convert: ConvertFn,
    free: Option<FreeFn>,
    // Dropped after the symbols that point into it
    _library: Library,
}

impl SharedLibrary {
    /// Load the library and resolve its symbols
    ///
    /// `ConvertHTMLToMarkdown` is required. Without `FreeCString` the result
    /// buffer is assumed to come from C `malloc` and is released with
    /// `free`.
    pub fn open(path: &Path) -> Result<Self, BridgeError> {
        let load_error = |source| BridgeError::Load {
            path: path.to_path_buf(),
            source,
        };

        // SAFETY: loading runs the library's initializers. The artifact is
        // the configured native component, trusted like the binary itself.
        let library = unsafe { Library::new(path) }.map_err(load_error)?;

        // SAFETY: the symbol types match the component's exported C ABI.
        let convert = unsafe { library.get::<ConvertFn>(CONVERT_SYMBOL) }
            .map(|symbol| *symbol)
            .map_err(load_error)?;
        let free = unsafe { library.get::<FreeFn>(FREE_SYMBOL) }
            .ok()
            .map(|symbol| *symbol);

        Ok(Self {
            convert,
            free,
            _library: library,
        })
    }
}

impl NativeComponent for SharedLibrary {
    fn convert(&self, html: &str) -> Result<String, BridgeError> {
        // Interior NUL bytes would truncate the C string
        let input = CString::new(html.replace('\0', ""))
            .map_err(|err| BridgeError::Invocation(err.to_string()))?;

        // SAFETY: `input` is a valid NUL-terminated string that outlives the call.
        let raw = unsafe { (self.convert)(input.as_ptr()) };
        if raw.is_null() {
            return Err(BridgeError::Invocation(
                "native component returned NULL".to_string(),
            ));
        }

        // SAFETY: the component returns a NUL-terminated string it allocated.
        let markdown = unsafe { CStr::from_ptr(raw) }
            .to_string_lossy()
            .into_owned();

        // SAFETY: `raw` came from this component and is released exactly once.
        unsafe {
            match self.free {
                Some(free) => free(raw),
                None => libc::free(raw.cast()),
            }
        }

        Ok(markdown)
    }
}

impl fmt::Debug for SharedLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedLibrary")
            .field("has_free", &self.free.is_some())
            .finish_non_exhaustive()
    }
}

type Loader =
    Arc<dyn Fn(&Path) -> Result<Arc<dyn NativeComponent>, BridgeError> + Send + Sync>;

/// Lazily loaded, shared handle to the native component
pub struct NativeBridge {
    path: PathBuf,
    timeout: Duration,
    loader: Loader,
    handle: OnceCell<Arc<dyn NativeComponent>>,
}

impl NativeBridge {
    /// Bridge to the shared library at `path`
    ///
    /// A zero `timeout` waits for the native call indefinitely.
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self::with_loader(path, timeout, |path| {
            let library = SharedLibrary::open(path)?;
            Ok(Arc::new(library) as Arc<dyn NativeComponent>)
        })
    }

    /// Bridge that creates its component with `loader` once the artifact is present
    pub fn with_loader<F>(path: impl Into<PathBuf>, timeout: Duration, loader: F) -> Self
    where
        F: Fn(&Path) -> Result<Arc<dyn NativeComponent>, BridgeError> + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            timeout,
            loader: Arc::new(loader),
            handle: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The artifact path made absolute against the working directory
    ///
    /// Falls back to the configured path when it cannot be resolved.
    pub fn resolved_path(&self) -> PathBuf {
        std::path::absolute(&self.path).unwrap_or_else(|_| self.path.clone())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the handle has been created
    pub fn is_loaded(&self) -> bool {
        self.handle.initialized()
    }

    /// Convert `html` with the native component
    ///
    /// # Errors
    ///
    /// - `ComponentUnavailable` when the artifact is missing
    /// - `Load` when it cannot be loaded
    /// - `Invocation` when the component fails or the call panics
    /// - `Timeout` when the call exceeds the bound
    pub async fn convert(&self, html: &str) -> Result<String, BridgeError> {
        let component = self.component().await?;
        let html = html.to_owned();
        let call = tokio::task::spawn_blocking(move || component.convert(&html));

        let joined = if self.timeout.is_zero() {
            call.await
        } else {
            tokio::time::timeout(self.timeout, call)
                .await
                .map_err(|_| BridgeError::Timeout(self.timeout))?
        };

        joined.map_err(|err| BridgeError::Invocation(format!("native call did not complete: {err}")))?
    }

    async fn component(&self) -> Result<Arc<dyn NativeComponent>, BridgeError> {
        let handle = self.handle.get_or_try_init(|| self.load()).await?;
        Ok(Arc::clone(handle))
    }

    async fn load(&self) -> Result<Arc<dyn NativeComponent>, BridgeError> {
        // An artifact that cannot even be stat'ed counts as missing
        let present = tokio::fs::try_exists(&self.path).await.unwrap_or(false);
        if !present {
            return Err(BridgeError::ComponentUnavailable {
                path: self.path.clone(),
            });
        }

        debug!(
            target = "html_markdown",
            path = %self.resolved_path().display(),
            "loading native markdown component"
        );

        let loader = Arc::clone(&self.loader);
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || loader(&path))
            .await
            .map_err(|err| BridgeError::Invocation(format!("native loader did not complete: {err}")))?
    }
}

impl fmt::Debug for NativeBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBridge")
            .field("path", &self.path)
            .field("timeout", &self.timeout)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct Echo;

    impl NativeComponent for Echo {
        fn convert(&self, html: &str) -> Result<String, BridgeError> {
            Ok(format!("echo:{html}"))
        }
    }

    #[test]
    fn test_resolved_path_is_absolute() {
        let bridge = NativeBridge::new("sharedLibs/lib.so", Duration::from_secs(1));
        let resolved = bridge.resolved_path();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("sharedLibs/lib.so"));
        assert_eq!(bridge.path(), Path::new("sharedLibs/lib.so"));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.so");
        let bridge = NativeBridge::new(&path, Duration::from_secs(1));

        let err = bridge.convert("<p>x</p>").await.expect_err("missing artifact");
        match err {
            BridgeError::ComponentUnavailable { path: reported } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!bridge.is_loaded());
    }

    #[tokio::test]
    async fn test_garbage_artifact_is_load_error() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(b"definitely not an ELF object")
            .expect("write");
        let bridge = NativeBridge::new(file.path(), Duration::from_secs(1));

        let err = bridge.convert("<p>x</p>").await.expect_err("not a library");
        assert!(matches!(err, BridgeError::Load { .. }), "got {err:?}");
        assert!(!err.is_unavailable());
        assert!(!bridge.is_loaded());
    }

    #[tokio::test]
    async fn test_loader_result_is_cached() {
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        let bridge = NativeBridge::with_loader(file.path(), Duration::ZERO, |_| {
            Ok(Arc::new(Echo) as Arc<dyn NativeComponent>)
        });

        assert_eq!(bridge.convert("a").await.expect("convert"), "echo:a");
        assert!(bridge.is_loaded());
        assert_eq!(bridge.convert("b").await.expect("convert"), "echo:b");
    }
}
