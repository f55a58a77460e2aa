// Playlist protocol: master playlist resolution and media playlist listing.

pub mod lister;
pub mod resolver;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use url::Url;

use crate::{FetchOutcome, segment::SegmentEntry};

pub use lister::{CacheBuster, HttpSegmentLister, parse_media_playlist};
pub use resolver::{HttpPlaylistResolver, parse_master_playlist};

/// Resolves a station to its current media playlist URL.
///
/// Any failure is fatal for the session; implementations never return
/// `TransientUnavailable`.
#[async_trait]
pub trait PlaylistResolver: Send + Sync {
    async fn resolve(&self, station: &str, headers: &HeaderMap) -> FetchOutcome<Url>;
}

/// Lists the segments currently advertised by a media playlist.
///
/// Entries come back in manifest order, which is not assumed to be sorted.
#[async_trait]
pub trait SegmentLister: Send + Sync {
    async fn list(
        &self,
        media_playlist_url: &Url,
        headers: &HeaderMap,
    ) -> FetchOutcome<Vec<SegmentEntry>>;
}
