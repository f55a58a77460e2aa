// In-process ADTS concatenation.

use std::path::{Path, PathBuf};

use aac::{AdtsFrames, PartialAudioSpecificConfig};
use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use super::{ConcatSummary, Concatenator};
use crate::RecorderError;

/// Copies the ADTS frames of every segment into one raw `.aac` stream.
///
/// ID3v2 tags carried by each segment are dropped, as are bytes that do not
/// belong to a complete frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdtsConcatenator;

impl AdtsConcatenator {
    pub fn new() -> Self {
        Self
    }

    async fn write_all(
        &self,
        sorted_paths: &[PathBuf],
        output: &Path,
    ) -> Result<ConcatSummary, RecorderError> {
        let file = tokio::fs::File::create(output).await?;
        let mut writer = BufWriter::new(file);
        let mut config: Option<PartialAudioSpecificConfig> = None;
        let mut frames = 0usize;
        let mut bytes_written = 0u64;

        for path in sorted_paths {
            let data = tokio::fs::read(path).await?;
            let mut iter = AdtsFrames::new(&data);
            let mut segment_frames = 0usize;

            for frame in iter.by_ref() {
                let frame_config = frame.header.audio_specific_config();
                match &config {
                    None => {
                        info!(
                            object_type = ?frame_config.audio_object_type,
                            sample_rate = frame_config.sampling_frequency,
                            channels = frame_config.channel_configuration,
                            "Audio stream configuration"
                        );
                        config = Some(frame_config);
                    }
                    Some(current) if *current != frame_config => {
                        warn!(
                            path = %path.display(),
                            from = ?current,
                            to = ?frame_config,
                            "Audio configuration changed between segments"
                        );
                        config = Some(frame_config);
                    }
                    Some(_) => {}
                }

                writer.write_all(frame.data).await?;
                bytes_written += frame.data.len() as u64;
                segment_frames += 1;
            }

            if segment_frames == 0 {
                warn!(path = %path.display(), "Segment holds no ADTS frames");
            }
            debug!(
                path = %path.display(),
                frames = segment_frames,
                id3_tags = iter.id3_tags(),
                skipped_bytes = iter.skipped_bytes(),
                "Segment copied"
            );
            frames += segment_frames;
        }

        writer.flush().await?;
        writer.into_inner().sync_all().await?;

        if frames == 0 {
            return Err(RecorderError::ConcatError(
                "no ADTS frames found in any segment".to_string(),
            ));
        }

        Ok(ConcatSummary {
            segments: sorted_paths.len(),
            bytes_written,
            frames: Some(frames),
        })
    }
}

#[async_trait]
impl Concatenator for AdtsConcatenator {
    async fn concatenate(
        &self,
        sorted_paths: &[PathBuf],
        output: &Path,
    ) -> Result<ConcatSummary, RecorderError> {
        if sorted_paths.is_empty() {
            return Err(RecorderError::ConcatError("no segments to concatenate".to_string()));
        }

        let result = self.write_all(sorted_paths, output).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(output).await;
        }
        result
    }
}
