use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use chrono_tz::Tz;
use reqwest::header::{HeaderMap, HeaderValue};
use url::Url;

use crate::{RecorderError, proxy::ProxyConfig};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Master playlist endpoint of the upstream broadcaster.
pub const DEFAULT_MASTER_PLAYLIST_URL: &str = "https://rpaa.smartstream.ne.jp/so/playlist.m3u8";

/// The upstream API requires a 40 character listener session id but never
/// checks its value.
pub const PLACEHOLDER_SESSION_ID: &str = "1111111111111111111111111111111111111111";

/// Fixed protocol parameters used to build the master playlist request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEndpoint {
    /// Base URL of the master playlist
    pub master_url: String,
    /// Value of the `l` (listing length) query parameter
    pub listing_length: u32,
    /// Value of the `lsid` query parameter
    pub session_id: String,
    /// Value of the `type` query parameter
    pub stream_type: String,
}

impl Default for PlaylistEndpoint {
    fn default() -> Self {
        Self {
            master_url: DEFAULT_MASTER_PLAYLIST_URL.to_owned(),
            listing_length: 15,
            session_id: PLACEHOLDER_SESSION_ID.to_owned(),
            stream_type: "b".to_owned(),
        }
    }
}

impl PlaylistEndpoint {
    /// Builds the master playlist URL for a station.
    pub fn master_playlist_url(&self, station: &str) -> Result<Url, RecorderError> {
        let listing_length = self.listing_length.to_string();
        Url::parse_with_params(
            &self.master_url,
            [
                ("station_id", station),
                ("l", listing_length.as_str()),
                ("lsid", self.session_id.as_str()),
                ("type", self.stream_type.as_str()),
            ],
        )
        .map_err(|e| RecorderError::UrlError(format!("{}: {e}", self.master_url)))
    }
}

/// HTTP client options shared by playlist and segment requests.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Overall timeout for a single HTTP request
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// How long idle pooled connections are kept
    pub pool_idle_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Headers sent with every request, before authentication headers
    pub headers: HeaderMap,

    /// Proxy configuration (optional)
    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(30),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: HttpConfig::get_default_headers(),
            proxy: None,
            use_system_proxy: true,
        }
    }
}

impl HttpConfig {
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("ja-JP,ja;q=0.9,en-US;q=0.5"),
        );
        default_headers
    }
}

/// How individual segments are downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentBackend {
    /// Streamed with the built-in HTTP client
    #[default]
    Native,
    /// Copied by an external ffmpeg process
    Ffmpeg,
}

/// How the retained segments are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcatBackend {
    /// ADTS frame copy in process
    #[default]
    Native,
    /// ffmpeg concat demuxer with stream copy
    Ffmpeg,
}

macro_rules! backend_str_impls {
    ($ty:ident) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    "native" => Ok($ty::Native),
                    "ffmpeg" => Ok($ty::Ffmpeg),
                    other => Err(format!("unknown backend '{other}', expected 'native' or 'ffmpeg'")),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $ty::Native => write!(f, "native"),
                    $ty::Ffmpeg => write!(f, "ffmpeg"),
                }
            }
        }
    };
}

backend_str_impls!(SegmentBackend);
backend_str_impls!(ConcatBackend);

/// Configuration of a recorder.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// HTTP client options
    pub http: HttpConfig,

    /// Master playlist endpoint
    pub endpoint: PlaylistEndpoint,

    /// Delay between two successful polls of the media playlist
    pub poll_interval: Duration,

    /// Delay before polling again after the media playlist was unavailable
    pub retry_delay: Duration,

    /// Re-resolve the media playlist URL after this long. `None` keeps the
    /// first resolved URL for the whole session.
    pub playlist_refresh_interval: Option<Duration>,

    /// Re-resolve the media playlist URL after this many consecutive
    /// unavailable polls. 0 disables it.
    pub reresolve_after_failures: u32,

    /// Maximum number of segment downloads in flight within one poll
    pub download_concurrency: usize,

    /// Segment download backend
    pub segment_backend: SegmentBackend,

    /// Concatenation backend
    pub concat_backend: ConcatBackend,

    /// ffmpeg executable used by the ffmpeg backends
    pub ffmpeg_path: PathBuf,

    /// Upper bound for an ffmpeg concatenation run
    pub concat_timeout: Duration,

    /// Extension of the temporary per-segment files
    pub segment_extension: String,

    /// Extension of the output file
    pub output_extension: String,

    /// Timezone used for output file names
    pub timezone: Tz,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            endpoint: PlaylistEndpoint::default(),
            poll_interval: Duration::from_secs(5),
            retry_delay: Duration::from_secs(3),
            playlist_refresh_interval: Some(Duration::from_secs(10 * 60)),
            reresolve_after_failures: 5,
            download_concurrency: 1,
            segment_backend: SegmentBackend::default(),
            concat_backend: ConcatBackend::default(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            concat_timeout: Duration::from_secs(10 * 60),
            segment_extension: "aac".to_owned(),
            output_extension: "aac".to_owned(),
            timezone: chrono_tz::Asia::Tokyo,
        }
    }
}

impl RecorderConfig {
    pub fn builder() -> crate::builder::RecorderConfigBuilder {
        crate::builder::RecorderConfigBuilder::new()
    }

    /// Whether the output extension names an MP4 family container.
    pub fn output_is_mp4(&self) -> bool {
        matches!(
            self.output_extension.to_ascii_lowercase().as_str(),
            "m4a" | "mp4" | "m4b"
        )
    }

    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.download_concurrency == 0 {
            return Err(RecorderError::ConfigError(
                "download concurrency must be at least 1".to_string(),
            ));
        }
        if self.output_extension.is_empty() || self.segment_extension.is_empty() {
            return Err(RecorderError::ConfigError(
                "file extensions must not be empty".to_string(),
            ));
        }
        if self.concat_backend == ConcatBackend::Native && self.output_is_mp4() {
            return Err(RecorderError::ConfigError(format!(
                "native concatenation writes ADTS and cannot produce .{} files, use the ffmpeg backend",
                self.output_extension
            )));
        }
        if self.endpoint.session_id.len() != PLACEHOLDER_SESSION_ID.len() {
            return Err(RecorderError::ConfigError(format!(
                "session id must be {} characters long",
                PLACEHOLDER_SESSION_ID.len()
            )));
        }
        Url::parse(&self.endpoint.master_url)
            .map_err(|e| RecorderError::ConfigError(format!("invalid master playlist URL: {e}")))?;
        Ok(())
    }
}
