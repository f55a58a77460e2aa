// Master playlist resolution.

use async_trait::async_trait;
use m3u8_rs::parse_playlist_res;
use reqwest::{Client, StatusCode, header::HeaderMap};
use tracing::{debug, warn};
use url::Url;

use super::PlaylistResolver;
use crate::{FetchOutcome, RecorderError, config::PlaylistEndpoint};

/// Longest slice of an error body that ends up in the logs.
const MAX_LOGGED_BODY: usize = 512;

pub struct HttpPlaylistResolver {
    http_client: Client,
    endpoint: PlaylistEndpoint,
}

impl HttpPlaylistResolver {
    pub fn new(http_client: Client, endpoint: PlaylistEndpoint) -> Self {
        Self {
            http_client,
            endpoint,
        }
    }

    async fn fetch_master(&self, station: &str, headers: &HeaderMap) -> Result<Url, RecorderError> {
        let master_url = self.endpoint.master_playlist_url(station)?;
        debug!(url = %master_url, "Requesting master playlist");

        let response = self
            .http_client
            .get(master_url.clone())
            .headers(headers.clone())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(MAX_LOGGED_BODY).collect();
            warn!(station, status = %status, content = %snippet, "Failed to get media playlist url");
            return Err(RecorderError::MasterPlaylistError(format!(
                "HTTP {status} from {master_url}"
            )));
        }

        let bytes = response.bytes().await?;
        parse_master_playlist(&bytes, &master_url)
    }
}

#[async_trait]
impl PlaylistResolver for HttpPlaylistResolver {
    async fn resolve(&self, station: &str, headers: &HeaderMap) -> FetchOutcome<Url> {
        match self.fetch_master(station, headers).await {
            Ok(url) => FetchOutcome::Success(url),
            Err(RecorderError::HttpError(e)) => FetchOutcome::Fatal(
                RecorderError::MasterPlaylistError(format!("request failed: {e}")),
            ),
            Err(e) => FetchOutcome::Fatal(e),
        }
    }
}

/// Returns the first sub-playlist URI of a master playlist, resolved against
/// the URL the playlist was fetched from.
pub fn parse_master_playlist(body: &[u8], master_url: &Url) -> Result<Url, RecorderError> {
    let content = std::str::from_utf8(body).map_err(|e| {
        RecorderError::MasterPlaylistError(format!("Playlist content is not valid UTF-8: {e}"))
    })?;

    let master = match parse_playlist_res(content.as_bytes()) {
        Ok(m3u8_rs::Playlist::MasterPlaylist(pl)) => pl,
        Ok(m3u8_rs::Playlist::MediaPlaylist(_)) => {
            return Err(RecorderError::MasterPlaylistError(
                "Expected Master Playlist, got Media".to_string(),
            ));
        }
        Err(e) => {
            return Err(RecorderError::MasterPlaylistError(format!(
                "Failed to parse master playlist: {e}"
            )));
        }
    };

    let variant = master.variants.first().ok_or_else(|| {
        RecorderError::MasterPlaylistError("Master playlist has no variants".to_string())
    })?;

    master_url.join(variant.uri.trim()).map_err(|e| {
        RecorderError::MasterPlaylistError(format!(
            "Could not join master URL with variant URI {}: {e}",
            variant.uri
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U\n\
        #EXT-X-VERSION:6\n\
        #EXT-X-STREAM-INF:BANDWIDTH=52973,CODECS=\"mp4a.40.5\"\n\
        https://rpaa.smartstream.ne.jp/so/medialist?session=abc\n\
        #EXT-X-STREAM-INF:BANDWIDTH=96000,CODECS=\"mp4a.40.2\"\n\
        https://rpaa.smartstream.ne.jp/so/medialist?session=def\n";

    fn master_url() -> Url {
        Url::parse("https://rpaa.smartstream.ne.jp/so/playlist.m3u8?station_id=TBS").unwrap()
    }

    #[test]
    fn first_variant_wins() {
        let url = parse_master_playlist(MASTER.as_bytes(), &master_url()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://rpaa.smartstream.ne.jp/so/medialist?session=abc"
        );
    }

    #[test]
    fn relative_variant_is_joined() {
        let body = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=48000\nmedialist?session=rel\n";
        let url = parse_master_playlist(body.as_bytes(), &master_url()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://rpaa.smartstream.ne.jp/so/medialist?session=rel"
        );
    }

    #[test]
    fn media_playlist_is_rejected() {
        let body = "#EXTM3U\n#EXT-X-TARGETDURATION:5\n#EXTINF:5,\nseg.aac\n";
        assert!(matches!(
            parse_master_playlist(body.as_bytes(), &master_url()),
            Err(RecorderError::MasterPlaylistError(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_master_playlist(b"<html>forbidden</html>", &master_url()).is_err());
        assert!(parse_master_playlist(&[0xff, 0xfe, 0x00], &master_url()).is_err());
    }
}
