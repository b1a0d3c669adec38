//! Converter configuration read from the process environment
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `USE_GO_MARKDOWN_PARSER` | `true` enables the native backend attempt | disabled |
//! | `HTML_TO_MARKDOWN_LIBRARY` | path of the native shared library | `sharedLibs/go-html-to-md/html-to-markdown.so` |
//! | `HTML_TO_MARKDOWN_NATIVE_TIMEOUT_MS` | bound on one native call, `0` disables it | `30000` |
//!
//! The configuration is immutable once built; the process-wide service
//! reads it exactly once.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

pub const USE_NATIVE_ENV: &str = "USE_GO_MARKDOWN_PARSER";
pub const LIBRARY_PATH_ENV: &str = "HTML_TO_MARKDOWN_LIBRARY";
pub const NATIVE_TIMEOUT_ENV: &str = "HTML_TO_MARKDOWN_NATIVE_TIMEOUT_MS";

/// Conventional location of the native component, relative to the working directory
pub const DEFAULT_LIBRARY_PATH: &str = "sharedLibs/go-html-to-md/html-to-markdown.so";

pub const DEFAULT_NATIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend selection and native bridge settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterConfig {
    /// Attempt the native backend before the fallback renderer
    pub use_native: bool,
    /// Shared library artifact of the native backend
    pub library_path: PathBuf,
    /// Bound on one native call; `Duration::ZERO` waits indefinitely
    pub native_timeout: Duration,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            use_native: false,
            library_path: PathBuf::from(DEFAULT_LIBRARY_PATH),
            native_timeout: DEFAULT_NATIVE_TIMEOUT,
        }
    }
}

impl ConverterConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    ///
    /// ```rust
    /// use html_markdown_converter::config::ConverterConfig;
    ///
    /// let config = ConverterConfig::from_lookup(|name| match name {
    ///     "USE_GO_MARKDOWN_PARSER" => Some("true".to_string()),
    ///     _ => None,
    /// });
    /// assert!(config.use_native);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let use_native = lookup(USE_NATIVE_ENV).is_some_and(|value| value == "true");

        let library_path = lookup(LIBRARY_PATH_ENV)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.library_path);

        let native_timeout = match lookup(NATIVE_TIMEOUT_ENV) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(millis) => Duration::from_millis(millis),
                Err(err) => {
                    warn!(
                        target = "html_markdown",
                        variable = NATIVE_TIMEOUT_ENV,
                        value = %raw,
                        error = %err,
                        "ignoring invalid native timeout"
                    );
                    defaults.native_timeout
                }
            },
            None => defaults.native_timeout,
        };

        Self {
            use_native,
            library_path,
            native_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ConverterConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConverterConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config, ConverterConfig::default());
        assert!(!config.use_native);
        assert_eq!(config.library_path, PathBuf::from(DEFAULT_LIBRARY_PATH));
        assert_eq!(config.native_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_only_literal_true_enables_native() {
        assert!(config_from(&[(USE_NATIVE_ENV, "true")]).use_native);
        for value in ["TRUE", "1", "yes", " true", ""] {
            assert!(
                !config_from(&[(USE_NATIVE_ENV, value)]).use_native,
                "{value:?} must not enable the native backend"
            );
        }
    }

    #[test]
    fn test_library_path_override() {
        let config = config_from(&[(LIBRARY_PATH_ENV, "/opt/lib/convert.so")]);
        assert_eq!(config.library_path, PathBuf::from("/opt/lib/convert.so"));

        let config = config_from(&[(LIBRARY_PATH_ENV, "  ")]);
        assert_eq!(config.library_path, PathBuf::from(DEFAULT_LIBRARY_PATH));
    }

    #[test]
    fn test_native_timeout_override() {
        let config = config_from(&[(NATIVE_TIMEOUT_ENV, "250")]);
        assert_eq!(config.native_timeout, Duration::from_millis(250));

        let config = config_from(&[(NATIVE_TIMEOUT_ENV, "0")]);
        assert!(config.native_timeout.is_zero());

        let config = config_from(&[(NATIVE_TIMEOUT_ENV, "soon")]);
        assert_eq!(config.native_timeout, DEFAULT_NATIVE_TIMEOUT);
    }
}
