//! # Builder for RecorderConfig
//!
//! Fluent construction of [`RecorderConfig`] values.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use radiorec_engine::{ConcatBackend, RecorderConfig};
//!
//! let config = RecorderConfig::builder()
//!     .with_timeout(Duration::from_secs(20))
//!     .with_poll_interval(Duration::from_secs(5))
//!     .with_download_concurrency(2)
//!     .with_concat_backend(ConcatBackend::Ffmpeg)
//!     .with_output_extension("m4a")
//!     .build();
//!
//! assert!(config.validate().is_ok());
//! ```

use std::{path::PathBuf, time::Duration};

use chrono_tz::Tz;
use reqwest::header::{HeaderMap, HeaderValue};

use crate::{
    config::{ConcatBackend, PlaylistEndpoint, RecorderConfig, SegmentBackend},
    proxy::ProxyConfig,
};

/// Builder for creating RecorderConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct RecorderConfigBuilder {
    /// Internal config being built
    config: RecorderConfig,
}

impl RecorderConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: RecorderConfig::default(),
        }
    }

    /// Set the overall timeout for a single HTTP request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.timeout = timeout;
        self
    }

    /// Set the connection timeout (time to establish initial connection)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.connect_timeout = timeout;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.http.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header sent with every request
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.http.headers.insert(name, value);
        }
        self
    }

    /// Merge custom headers over the defaults
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.config.http.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Set an explicit proxy; disables the system proxy
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.http.proxy = Some(proxy);
        self.config.http.use_system_proxy = false;
        self
    }

    /// Enable or disable system proxy detection
    pub fn with_system_proxy(mut self, enabled: bool) -> Self {
        self.config.http.use_system_proxy = enabled;
        self
    }

    /// Replace the master playlist endpoint parameters
    pub fn with_endpoint(mut self, endpoint: PlaylistEndpoint) -> Self {
        self.config.endpoint = endpoint;
        self
    }

    /// Override only the master playlist base URL
    pub fn with_master_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint.master_url = url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    /// Periodically re-resolve the media playlist URL, `None` to disable
    pub fn with_playlist_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.playlist_refresh_interval = interval;
        self
    }

    pub fn with_reresolve_after_failures(mut self, failures: u32) -> Self {
        self.config.reresolve_after_failures = failures;
        self
    }

    pub fn with_download_concurrency(mut self, concurrency: usize) -> Self {
        self.config.download_concurrency = concurrency;
        self
    }

    pub fn with_segment_backend(mut self, backend: SegmentBackend) -> Self {
        self.config.segment_backend = backend;
        self
    }

    pub fn with_concat_backend(mut self, backend: ConcatBackend) -> Self {
        self.config.concat_backend = backend;
        self
    }

    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ffmpeg_path = path.into();
        self
    }

    pub fn with_concat_timeout(mut self, timeout: Duration) -> Self {
        self.config.concat_timeout = timeout;
        self
    }

    pub fn with_output_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.output_extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.config.timezone = timezone;
        self
    }

    /// Build the final RecorderConfig
    pub fn build(self) -> RecorderConfig {
        self.config
    }
}

impl Default for RecorderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
