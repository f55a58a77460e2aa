use clap::Parser;
use radiorec_engine::{ConcatBackend, DEFAULT_MASTER_PLAYLIST_URL, SegmentBackend};
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    author = "hua0512 <https://github.com/hua0512>",
    version,
    about = "Live radio recorder",
    long_about = "Records a live radio station for a fixed duration.\n\
                  \n\
                  The station's media playlist is polled until the duration has elapsed,\n\
                  every advertised segment is downloaded once, and the segments are merged\n\
                  into a single audio file without re-encoding. Temporary files are removed\n\
                  when the recording ends."
)]
pub struct CliArgs {
    /// Station identifier
    #[arg(help = "Station identifier, e.g. TBS")]
    pub station: String,

    /// Program label used in the output file name
    #[arg(help = "Program label used in the output file name")]
    pub program: String,

    /// Recording duration
    #[arg(
        help = "Recording duration. A bare number is minutes; units s, m and h are accepted (e.g. \"90s\", \"1.5h\")"
    )]
    pub duration: String,

    /// Output directory
    #[arg(
        short,
        long,
        env = "AUDIO_OUTPUT_DIR_PATH",
        default_value = "./work/output",
        help = "Directory where the recording is saved"
    )]
    pub output_dir: PathBuf,

    /// Temporary directory
    #[arg(
        long,
        env = "AUDIO_TEMPORARY_DIR_PATH",
        default_value = "./work/output/.tmp",
        help = "Directory holding per-session segment files"
    )]
    pub temp_dir: PathBuf,

    /// Log file
    #[arg(
        long,
        env = "LOG_FILE_PATH",
        default_value = "./work/log/app.log",
        help = "File that receives a copy of the log output"
    )]
    pub log_file: PathBuf,

    /// Area id sent with every request
    #[arg(
        long,
        env = "RADIKO_AREA_ID",
        default_value = "JP14",
        help = "Area id sent as the X-Radiko-AreaId header. Empty to omit"
    )]
    pub area_id: String,

    /// Authentication token sent with every request
    #[arg(
        long,
        env = "RADIKO_AUTH_TOKEN",
        hide_env_values = true,
        help = "Authentication token sent as the X-Radiko-AuthToken header"
    )]
    pub auth_token: Option<String>,

    /// Custom HTTP headers
    #[arg(
        long = "header",
        short = 'H',
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    /// Master playlist URL
    #[arg(
        long,
        default_value = DEFAULT_MASTER_PLAYLIST_URL,
        help = "Base URL of the master playlist"
    )]
    pub master_url: String,

    /// Output file extension
    #[arg(
        short = 'e',
        long,
        default_value = "aac",
        help = "Output file extension. MP4 family extensions (m4a, mp4, m4b) need the ffmpeg concat backend"
    )]
    pub extension: String,

    /// Timezone for output file names
    #[arg(
        long,
        default_value = "Asia/Tokyo",
        help = "IANA timezone used for the time in output file names"
    )]
    pub timezone: String,

    /// Seconds between polls
    #[arg(
        long,
        default_value = "5",
        help = "Seconds to wait between two successful playlist polls"
    )]
    pub poll_interval: u64,

    /// Seconds to wait after an unavailable poll
    #[arg(
        long,
        default_value = "3",
        help = "Seconds to wait before polling again when the playlist is unavailable"
    )]
    pub retry_delay: u64,

    /// Playlist refresh interval in seconds
    #[arg(
        long,
        default_value = "600",
        help = "Re-resolve the media playlist URL every N seconds. Use 0 to disable"
    )]
    pub refresh_interval: u64,

    /// Unavailable polls before re-resolving
    #[arg(
        long,
        default_value = "5",
        help = "Re-resolve the media playlist URL after N unavailable polls in a row. Use 0 to disable"
    )]
    pub reresolve_after: u32,

    /// Concurrent segment downloads
    #[arg(
        short = 'c',
        long,
        default_value = "1",
        help = "Maximum number of concurrent segment downloads per poll"
    )]
    pub concurrency: usize,

    /// Segment download backend
    #[arg(
        long,
        default_value = "native",
        help = "Segment download backend (native, ffmpeg)"
    )]
    pub segment_backend: SegmentBackend,

    /// Concatenation backend
    #[arg(
        long,
        default_value = "native",
        help = "Concatenation backend (native, ffmpeg)"
    )]
    pub concat_backend: ConcatBackend,

    /// ffmpeg executable
    #[arg(
        long,
        env = "FFMPEG_PATH",
        default_value = "ffmpeg",
        help = "Path to the ffmpeg executable used by the ffmpeg backends"
    )]
    pub ffmpeg_path: PathBuf,

    /// Overall timeout in seconds
    #[arg(
        long,
        default_value = "30",
        help = "Overall timeout in seconds for HTTP requests and ffmpeg segment fetches"
    )]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value = "10",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    /// Proxy URL (e.g., "http://proxy.example.com:8080")
    #[arg(
        long,
        help = "Proxy server URL for downloads (e.g., \"http://proxy.example.com:8080\")"
    )]
    pub proxy: Option<String>,

    /// Proxy type (http, https, socks5, all)
    #[arg(
        long,
        default_value = "all",
        help = "Proxy type (http, https, socks5, all)",
        value_parser = ["http", "https", "socks5", "all"]
    )]
    pub proxy_type: String,

    /// Proxy username
    #[arg(long, help = "Username for proxy authentication")]
    pub proxy_user: Option<String>,

    /// Proxy password
    #[arg(long, help = "Password for proxy authentication")]
    pub proxy_pass: Option<String>,

    /// Use system proxy settings for downloads
    #[arg(
        long,
        default_value = "true",
        help = "Use system proxy settings for downloads if no explicit proxy is configured"
    )]
    pub use_system_proxy: bool,

    /// Disable all proxy settings for downloads
    #[arg(
        long,
        help = "Disable all proxy settings (including system proxy) for downloads"
    )]
    pub no_proxy: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,

    /// Show progress
    #[arg(
        short = 'P',
        long = "progress",
        default_value = "false",
        help = "Show a progress spinner while recording"
    )]
    pub show_progress: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_arguments_and_defaults() {
        let args = CliArgs::try_parse_from(["radiorec", "TBS", "news", "30"]).unwrap();
        assert_eq!(args.station, "TBS");
        assert_eq!(args.program, "news");
        assert_eq!(args.duration, "30");
        assert_eq!(args.concurrency, 1);
        assert_eq!(args.segment_backend, SegmentBackend::Native);
        assert_eq!(args.master_url, DEFAULT_MASTER_PLAYLIST_URL);
    }

    #[test]
    fn backends_and_headers_parse() {
        let args = CliArgs::try_parse_from([
            "radiorec",
            "TBS",
            "news",
            "1h",
            "--concat-backend",
            "ffmpeg",
            "-H",
            "Referer: https://radiko.jp/",
            "-H",
            "X-Test: 1",
        ])
        .unwrap();
        assert_eq!(args.concat_backend, ConcatBackend::Ffmpeg);
        assert_eq!(args.headers.len(), 2);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(
            CliArgs::try_parse_from(["radiorec", "TBS", "news", "30", "--segment-backend", "curl"])
                .is_err()
        );
    }
}
