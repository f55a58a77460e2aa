use reqwest::StatusCode;

/// Error type shared by every stage of a recording session.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    UrlError(String),

    #[error("Server returned status code {0}")]
    StatusCode(StatusCode),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Master playlist error: {0}")]
    MasterPlaylistError(String),

    #[error("Media playlist error: {0}")]
    MediaPlaylistError(String),

    #[error("Authentication headers unavailable: {0}")]
    AuthenticationError(String),

    #[error("Invalid header: {0}")]
    HeaderError(String),

    #[error("Segment decode error: {0}")]
    SegmentDecodeError(String),

    #[error("ffmpeg error: {0}")]
    FfmpegError(String),

    #[error("Concatenation error: {0}")]
    ConcatError(String),

    #[error("Invalid proxy configuration: {0}")]
    ProxyError(String),

    #[error("TLS configuration error: {0}")]
    TlsError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Operation timed out: {0}")]
    TimeoutError(String),
}

impl From<url::ParseError> for RecorderError {
    fn from(err: url::ParseError) -> Self {
        RecorderError::UrlError(err.to_string())
    }
}

/// Result of an upstream manifest request.
///
/// Callers branch on the kind instead of inspecting error values:
/// `TransientUnavailable` means "no data yet, try again later" while
/// `Fatal` ends the session.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Success(T),
    TransientUnavailable { reason: String },
    Fatal(RecorderError),
}

impl<T> FetchOutcome<T> {
    pub fn transient(reason: impl Into<String>) -> Self {
        FetchOutcome::TransientUnavailable {
            reason: reason.into(),
        }
    }

    /// Collapses the outcome into a `Result`, treating unavailability as an
    /// error built by `on_transient`.
    pub fn into_result(
        self,
        on_transient: impl FnOnce(String) -> RecorderError,
    ) -> Result<T, RecorderError> {
        match self {
            FetchOutcome::Success(value) => Ok(value),
            FetchOutcome::TransientUnavailable { reason } => Err(on_transient(reason)),
            FetchOutcome::Fatal(err) => Err(err),
        }
    }
}
