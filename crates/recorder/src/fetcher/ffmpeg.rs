// Segment fetcher that delegates the transfer to ffmpeg.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;

use super::SegmentFetcher;
use crate::{
    RecorderError,
    ffmpeg::{FfmpegCommand, path_arg},
    headers::HeaderBlock,
    segment::SegmentEntry,
};

pub struct FfmpegSegmentFetcher {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegSegmentFetcher {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
        }
    }

    fn command(&self, entry: &SegmentEntry, destination: &Path, headers: &HeaderBlock) -> FfmpegCommand {
        let mut command = FfmpegCommand::new(&self.ffmpeg_path, self.timeout);
        if !headers.is_empty() {
            command = command.args(["-headers", headers.as_str()]);
        }
        // The destination carries a `.part` suffix, so the muxer is named.
        command
            .args(["-f", "aac", "-i", entry.uri.as_str(), "-c", "copy", "-f", "adts"])
            .arg(path_arg(destination))
    }
}

#[async_trait]
impl SegmentFetcher for FfmpegSegmentFetcher {
    async fn fetch(
        &self,
        entry: &SegmentEntry,
        destination: &Path,
        headers: &HeaderBlock,
    ) -> Result<u64, RecorderError> {
        self.command(entry, destination, headers).run().await?;

        let bytes = tokio::fs::metadata(destination).await?.len();
        if bytes == 0 {
            return Err(RecorderError::SegmentDecodeError(format!(
                "ffmpeg wrote an empty file for {}",
                entry.uri
            )));
        }
        Ok(bytes)
    }
}
