// Media playlist listing with cache busting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use m3u8_rs::parse_playlist_res;
use reqwest::{Client, StatusCode, header::HeaderMap};
use tracing::{debug, trace};
use url::Url;

use super::SegmentLister;
use crate::{
    FetchOutcome,
    segment::{SegmentEntry, SegmentTimestamp},
};

/// Produces strictly increasing query tokens so intermediate caches never
/// answer a poll with a stale manifest.
#[derive(Debug, Default)]
pub struct CacheBuster {
    last: AtomicU64,
}

impl CacheBuster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Centiseconds since the Unix epoch, bumped past the previous token
    /// when the clock has not moved or went backwards.
    pub fn next_token(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| (d.as_millis() / 10) as u64)
            .unwrap_or_default();
        self.next_after(now)
    }

    fn next_after(&self, now: u64) -> u64 {
        let mut prev = self.last.load(Ordering::Acquire);
        loop {
            let candidate = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }

    /// `url` with the next token appended as the `_` query parameter.
    pub fn apply(&self, url: &Url) -> Url {
        let mut busted = url.clone();
        busted
            .query_pairs_mut()
            .append_pair("_", &self.next_token().to_string());
        busted
    }
}

pub struct HttpSegmentLister {
    http_client: Client,
    cache_buster: CacheBuster,
}

impl HttpSegmentLister {
    pub fn new(http_client: Client) -> Self {
        Self {
            http_client,
            cache_buster: CacheBuster::new(),
        }
    }
}

#[async_trait]
impl SegmentLister for HttpSegmentLister {
    async fn list(
        &self,
        media_playlist_url: &Url,
        headers: &HeaderMap,
    ) -> FetchOutcome<Vec<SegmentEntry>> {
        let request_url = self.cache_buster.apply(media_playlist_url);
        trace!(url = %request_url, "Polling media playlist");

        let response = match self
            .http_client
            .get(request_url)
            .headers(headers.clone())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return FetchOutcome::transient(format!("request failed: {e}")),
        };

        if response.status() != StatusCode::OK {
            return FetchOutcome::transient(format!("HTTP {}", response.status()));
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return FetchOutcome::transient(format!("failed to read body: {e}")),
        };

        match parse_media_playlist(&body, media_playlist_url) {
            Ok(entries) => FetchOutcome::Success(entries),
            Err(reason) => FetchOutcome::transient(reason),
        }
    }
}

/// Parses a media playlist into `(timestamp, absolute uri)` entries in
/// manifest order.
///
/// Segments without `EXT-X-PROGRAM-DATE-TIME` have no identity and are
/// skipped.
pub fn parse_media_playlist(body: &[u8], playlist_url: &Url) -> Result<Vec<SegmentEntry>, String> {
    let playlist = match parse_playlist_res(body) {
        Ok(m3u8_rs::Playlist::MediaPlaylist(pl)) => pl,
        Ok(m3u8_rs::Playlist::MasterPlaylist(_)) => {
            return Err(format!("Expected Media Playlist, got Master for {playlist_url}"));
        }
        Err(e) => return Err(format!("Failed to parse media playlist: {e}")),
    };

    let mut entries = Vec::with_capacity(playlist.segments.len());
    for segment in &playlist.segments {
        let Some(date_time) = segment.program_date_time.as_ref() else {
            debug!(uri = %segment.uri, "Segment has no program date-time, skipping");
            continue;
        };

        let uri = playlist_url
            .join(segment.uri.trim())
            .map(|u| u.to_string())
            .unwrap_or_else(|_| segment.uri.clone());

        entries.push(SegmentEntry {
            timestamp: SegmentTimestamp::from_program_date_time(date_time),
            uri,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEDIA: &str = "#EXTM3U\n\
        #EXT-X-VERSION:3\n\
        #EXT-X-TARGETDURATION:5\n\
        #EXT-X-MEDIA-SEQUENCE:100\n\
        #EXT-X-PROGRAM-DATE-TIME:2024-05-01T09:00:05+09:00\n\
        #EXTINF:5,\n\
        https://media.example/seg/b.aac\n\
        #EXT-X-PROGRAM-DATE-TIME:2024-05-01T09:00:00+09:00\n\
        #EXTINF:5,\n\
        seg/a.aac\n\
        #EXTINF:5,\n\
        seg/undated.aac\n";

    fn playlist_url() -> Url {
        Url::parse("https://media.example/so/medialist?session=abc").unwrap()
    }

    #[test]
    fn entries_keep_manifest_order_and_resolve_uris() {
        let entries = parse_media_playlist(MEDIA.as_bytes(), &playlist_url()).unwrap();
        assert_eq!(
            entries,
            vec![
                SegmentEntry::new("20240501T000005.000Z", "https://media.example/seg/b.aac"),
                SegmentEntry::new("20240501T000000.000Z", "https://media.example/so/seg/a.aac"),
            ]
        );
    }

    #[test]
    fn master_playlist_is_not_a_listing() {
        let body = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=48000\nmedialist\n";
        assert!(parse_media_playlist(body.as_bytes(), &playlist_url()).is_err());
    }

    #[test]
    fn cache_buster_is_strictly_monotonic() {
        let buster = CacheBuster::new();
        assert_eq!(buster.next_after(500), 500);
        // clock stalled
        assert_eq!(buster.next_after(500), 501);
        // clock went backwards
        assert_eq!(buster.next_after(100), 502);
        assert_eq!(buster.next_after(900), 900);

        let a = buster.next_token();
        let b = buster.next_token();
        assert!(b > a);
    }

    #[test]
    fn cache_buster_appends_query_parameter() {
        let buster = CacheBuster::new();
        let url = buster.apply(&playlist_url());
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs[0], ("session".to_string(), "abc".to_string()));
        assert_eq!(pairs[1].0, "_");
        assert!(pairs[1].1.parse::<u64>().is_ok());
    }
}
