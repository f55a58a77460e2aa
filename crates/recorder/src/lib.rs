//! # Radiorec engine
//!
//! Records live segmented audio from an HLS style radio stream for a fixed
//! duration and merges the pieces into a single file.
//!
//! ## Features
//!
//! - Master playlist resolution and cache-busted media playlist polling
//! - Timestamp keyed segment store with at-most-once downloads
//! - Native HTTP or ffmpeg segment fetching
//! - Native ADTS or ffmpeg concat demuxer merging
//! - Unconditional cleanup of the per-session temporary directory

pub mod builder;
pub mod client;
pub mod concat;
pub mod config;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod ffmpeg;
pub mod headers;
pub mod output;
pub mod playlist;
pub mod proxy;
pub mod recorder;
pub mod segment;
pub mod store;

pub use builder::RecorderConfigBuilder;
pub use config::{
    ConcatBackend, DEFAULT_MASTER_PLAYLIST_URL, HttpConfig, PLACEHOLDER_SESSION_ID,
    PlaylistEndpoint, RecorderConfig, SegmentBackend,
};
pub use error::{FetchOutcome, RecorderError};

pub use concat::{ConcatOutcome, ConcatSummary, Concatenator};
pub use events::{EventCallback, RecorderEvent};
pub use fetcher::{DownloadOutcome, SegmentFetcher, try_download};
pub use headers::{HeaderBlock, HeaderProvider, StaticHeaders, parse_header_line};
pub use playlist::{PlaylistResolver, SegmentLister};
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
pub use recorder::{Recorder, RecordingReport, RecordingRequest};
pub use segment::{Segment, SegmentEntry, SegmentTimestamp};
pub use store::SegmentStore;

pub use output::{ensure_dir, output_file_name, output_path, sanitize_file_component};
pub use client::create_client;
