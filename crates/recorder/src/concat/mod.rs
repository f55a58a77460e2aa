// Merging retrieved segments into the output file.

pub mod adts;
pub mod ffmpeg;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::RecorderError;

pub use adts::AdtsConcatenator;
pub use ffmpeg::FfmpegConcatenator;

/// Stream-copies segment files, already sorted by timestamp, into one file.
#[async_trait]
pub trait Concatenator: Send + Sync {
    async fn concatenate(
        &self,
        sorted_paths: &[PathBuf],
        output: &Path,
    ) -> Result<ConcatSummary, RecorderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatSummary {
    pub segments: usize,
    pub bytes_written: u64,
    /// Number of audio frames copied, when the backend counts them.
    pub frames: Option<usize>,
}

/// What happened to the output file of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConcatOutcome {
    Completed(ConcatSummary),
    /// Nothing was retrieved, so no output was written.
    Skipped,
    Failed(String),
}

impl ConcatOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ConcatOutcome::Completed(_))
    }
}
