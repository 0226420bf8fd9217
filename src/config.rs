//! Client configuration.
//!
//! Everything the client needs to know about its environment lives in
//! [`ClientConfig`], built via [`ClientConfigBuilder`]. The only value most
//! deployments change is the service base URL, which can also come from the
//! `IMGCONV_API_BASE_URL` environment variable.

use crate::error::ImgConvError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the conversion service base URL.
pub const BASE_URL_ENV: &str = "IMGCONV_API_BASE_URL";

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Output formats offered when the service cannot tell us its own list.
pub const DEFAULT_FORMATS: [&str; 3] = ["jpeg", "png", "webp"];

/// [`DEFAULT_FORMATS`] as owned strings.
pub fn default_formats() -> Vec<String> {
    DEFAULT_FORMATS.iter().map(|f| f.to_string()).collect()
}

/// Configuration for talking to the conversion service.
///
/// # Example
/// ```rust
/// use imgconv::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("https://convert.example.com")
///     .request_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url, "https://convert.example.com");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Service root, e.g. `http://localhost:8000`. A trailing slash is stripped.
    pub base_url: String,

    /// Per-request timeout in seconds. `None` leaves the transport default
    /// in place (no client-side timeout).
    pub request_timeout_secs: Option<u64>,

    /// Parent directory for the per-session preview directory.
    /// `None` uses the system temp dir.
    pub preview_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: None,
            preview_dir: None,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Default configuration with the base URL taken from
    /// [`BASE_URL_ENV`] when it is set and non-empty.
    pub fn from_env() -> Result<Self, ImgConvError> {
        let mut builder = Self::builder();
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                builder = builder.base_url(url);
            }
        }
        builder.build()
    }

    /// Join `path` onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Service root. Surrounding whitespace and a trailing `/` are dropped.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim().trim_end_matches('/').to_string();
        self
    }

    /// Per-request timeout in seconds (must be ≥ 1).
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    /// Parent directory for the session's preview files.
    pub fn preview_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.preview_dir = Some(dir.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ImgConvError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(ImgConvError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(ImgConvError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
