// Segment fetcher built on the shared HTTP client.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::trace;
use url::Url;

use super::SegmentFetcher;
use crate::{RecorderError, headers::HeaderBlock, segment::SegmentEntry};

/// Bytes inspected for an ADTS frame before a segment is accepted.
const PROBE_LEN: usize = 64 * 1024;

pub struct HttpSegmentFetcher {
    http_client: Client,
}

impl HttpSegmentFetcher {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl SegmentFetcher for HttpSegmentFetcher {
    async fn fetch(
        &self,
        entry: &SegmentEntry,
        destination: &Path,
        headers: &HeaderBlock,
    ) -> Result<u64, RecorderError> {
        let url = Url::parse(&entry.uri)
            .map_err(|e| RecorderError::UrlError(format!("{}: {e}", entry.uri)))?;

        let response = self
            .http_client
            .get(url)
            .headers(headers.to_header_map()?)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RecorderError::StatusCode(status));
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut probe: Vec<u8> = Vec::with_capacity(PROBE_LEN);
        let mut validated = false;
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !validated {
                let take = (PROBE_LEN - probe.len()).min(chunk.len());
                probe.extend_from_slice(&chunk[..take]);
                if aac::contains_adts_frame(&probe) {
                    validated = true;
                } else if probe.len() >= PROBE_LEN {
                    return Err(RecorderError::SegmentDecodeError(format!(
                        "no ADTS frame in the first {PROBE_LEN} bytes of {}",
                        entry.uri
                    )));
                }
            }
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        if !validated {
            return Err(RecorderError::SegmentDecodeError(format!(
                "{} holds no ADTS frame ({written} bytes)",
                entry.uri
            )));
        }

        file.flush().await?;
        file.sync_all().await?;
        trace!(uri = %entry.uri, bytes = written, "Segment written");
        Ok(written)
    }
}
