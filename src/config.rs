//! Configuration for talking to the conversion service.
//!
//! Every knob lives in [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. The CLI maps its flags onto the builder; the
//! library entry points in [`crate::convert`] take the built config.

use crate::error::Hand2ExcalError;
use crate::progress::{SharedObserver, WorkflowObserver};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Base URL used when none is configured: a local uvicorn instance.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Environment variable overriding [`ConversionConfig::base_url`].
pub const ENV_API_URL: &str = "HAND2EXCAL_API_URL";

/// Environment variable overriding [`ConversionConfig::request_timeout_secs`].
pub const ENV_TIMEOUT_SECS: &str = "HAND2EXCAL_TIMEOUT_SECS";

/// Configuration for a conversion run.
///
/// # Example
/// ```rust
/// use hand2excal::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .base_url("https://hand2excal.example.com")
///     .request_timeout_secs(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url, "https://hand2excal.example.com");
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Root URL of the conversion service, without a trailing slash.
    /// Default: `http://localhost:8000`.
    pub base_url: String,

    /// Whole-request timeout in seconds. Default: 120.
    ///
    /// Vision inference on the server routinely takes 10–40 s for a busy
    /// whiteboard photo. A timeout surfaces as a transport failure.
    pub request_timeout_secs: u64,

    /// Cadence of the cosmetic progress messages in milliseconds. Default: 3000.
    pub progress_interval_ms: u64,

    /// Receives state transitions, preview renders and progress messages.
    pub observer: Option<SharedObserver>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 120,
            progress_interval_ms: 3000,
            observer: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("progress_interval_ms", &self.progress_interval_ms)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn WorkflowObserver>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults, overridden by `HAND2EXCAL_API_URL` and
    /// `HAND2EXCAL_TIMEOUT_SECS` when they are set and non-empty.
    pub fn from_env() -> Result<Self, Hand2ExcalError> {
        let mut builder = Self::builder();
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                builder = builder.base_url(url);
            }
        }
        if let Ok(raw) = std::env::var(ENV_TIMEOUT_SECS) {
            if !raw.trim().is_empty() {
                let secs = raw.trim().parse::<u64>().map_err(|_| {
                    Hand2ExcalError::InvalidConfig(format!(
                        "{ENV_TIMEOUT_SECS} must be a whole number of seconds, got '{raw}'"
                    ))
                })?;
                builder = builder.request_timeout_secs(secs);
            }
        }
        builder.build()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Join `path` (starting with `/`) onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.config.base_url = url.trim().trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn progress_interval_ms(mut self, ms: u64) -> Self {
        self.config.progress_interval_ms = ms;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn WorkflowObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Hand2ExcalError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(Hand2ExcalError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.progress_interval_ms == 0 {
            return Err(Hand2ExcalError::InvalidConfig(
                "progress interval must be ≥ 1 ms".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.base_url, DEFAULT_BASE_URL);
        assert_eq!(c.request_timeout_secs, 120);
        assert_eq!(c.progress_interval(), Duration::from_secs(3));
        assert!(c.observer.is_none());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let c = ConversionConfig::builder()
            .base_url("https://example.com/")
            .build()
            .unwrap();
        assert_eq!(c.endpoint("/api/convert"), "https://example.com/api/convert");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = ConversionConfig::builder()
            .base_url("ftp://example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http://"), "got: {err}");
    }

    #[test]
    fn rejects_zero_interval() {
        let err = ConversionConfig::builder()
            .progress_interval_ms(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Hand2ExcalError::InvalidConfig(_)));
    }

    #[test]
    fn timeout_is_at_least_one_second() {
        let c = ConversionConfig::builder()
            .request_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.request_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn debug_hides_observer() {
        let c = ConversionConfig::builder()
            .observer(Arc::new(crate::progress::NoopObserver))
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("<dyn WorkflowObserver>"));
    }
}
