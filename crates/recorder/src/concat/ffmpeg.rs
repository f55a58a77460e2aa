// Concatenation through ffmpeg's concat demuxer.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ConcatSummary, Concatenator};
use crate::{
    RecorderError,
    ffmpeg::{FfmpegCommand, path_arg},
    store::CONCAT_LIST_FILE,
};

pub struct FfmpegConcatenator {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegConcatenator {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
        }
    }

    fn command(&self, list_path: &Path, output: &Path) -> FfmpegCommand {
        let mut command = FfmpegCommand::new(&self.ffmpeg_path, self.timeout)
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(path_arg(list_path))
            .args(["-map", "0:a", "-c", "copy"]);
        if needs_asc_fixup(output) {
            command = command.args(["-bsf:a", "aac_adtstoasc"]);
        }
        command.arg(path_arg(output))
    }
}

/// MP4 family containers store the AudioSpecificConfig out of band.
fn needs_asc_fixup(output: &Path) -> bool {
    output
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "m4a" | "mp4" | "m4b"))
}

/// Renders a concat demuxer list with one quoted absolute path per line.
pub fn concat_list(sorted_paths: &[PathBuf]) -> Result<String, RecorderError> {
    let mut list = String::new();
    for path in sorted_paths {
        let absolute = std::path::absolute(path)?;
        let escaped = absolute.to_string_lossy().replace('\'', r"'\''");
        list.push_str("file '");
        list.push_str(&escaped);
        list.push_str("'\n");
    }
    Ok(list)
}

#[async_trait]
impl Concatenator for FfmpegConcatenator {
    async fn concatenate(
        &self,
        sorted_paths: &[PathBuf],
        output: &Path,
    ) -> Result<ConcatSummary, RecorderError> {
        let Some(first) = sorted_paths.first() else {
            return Err(RecorderError::ConcatError("no segments to concatenate".to_string()));
        };

        let list_dir = first.parent().unwrap_or_else(|| Path::new("."));
        let list_path = list_dir.join(CONCAT_LIST_FILE);
        tokio::fs::write(&list_path, concat_list(sorted_paths)?).await?;
        debug!(list = %list_path.display(), segments = sorted_paths.len(), "Wrote concat list");

        let result = self.command(&list_path, output).run().await;

        if let Err(e) = tokio::fs::remove_file(&list_path).await {
            warn!(path = %list_path.display(), error = %e, "Failed to remove concat list");
        }

        match result {
            Ok(()) => {
                let bytes_written = tokio::fs::metadata(output).await?.len();
                Ok(ConcatSummary {
                    segments: sorted_paths.len(),
                    bytes_written,
                    frames: None,
                })
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(output).await;
                Err(RecorderError::ConcatError(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: &FfmpegCommand) -> Vec<String> {
        command
            .get_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn adts_output_is_plain_stream_copy() {
        let concat = FfmpegConcatenator::new("ffmpeg", Duration::from_secs(60));
        let command = concat.command(Path::new("/tmp/s/concat_list.txt"), Path::new("/out/a.aac"));
        assert_eq!(
            args(&command),
            vec![
                "-y",
                "-loglevel",
                "error",
                "-f",
                "concat",
                "-safe",
                "0",
                "-i",
                "/tmp/s/concat_list.txt",
                "-map",
                "0:a",
                "-c",
                "copy",
                "/out/a.aac",
            ]
        );
    }

    #[test]
    fn mp4_output_gets_asc_fixup() {
        let concat = FfmpegConcatenator::new("ffmpeg", Duration::from_secs(60));
        let command = concat.command(Path::new("list.txt"), Path::new("/out/a.M4A"));
        let args = args(&command);
        let pos = args.iter().position(|a| a == "-bsf:a").unwrap();
        assert_eq!(args[pos + 1], "aac_adtstoasc");
        assert_eq!(args.last().unwrap(), "/out/a.M4A");
    }

    #[test]
    fn list_quotes_and_escapes_paths() {
        let list = concat_list(&[
            PathBuf::from("/tmp/s/1000.aac"),
            PathBuf::from("/tmp/it's/1001.aac"),
        ])
        .unwrap();
        assert_eq!(
            list,
            "file '/tmp/s/1000.aac'\nfile '/tmp/it'\\''s/1001.aac'\n"
        );
    }

    #[tokio::test]
    async fn failed_run_removes_list_file() {
        let dir = tempfile::tempdir().unwrap();
        let segment = dir.path().join("1000.aac");
        tokio::fs::write(&segment, b"data").await.unwrap();

        let concat = FfmpegConcatenator::new("/nonexistent/ffmpeg-binary", Duration::from_secs(5));
        let output = dir.path().join("out.aac");
        let result = concat.concatenate(&[segment], &output).await;

        assert!(matches!(result, Err(RecorderError::ConcatError(_))));
        assert!(!dir.path().join(CONCAT_LIST_FILE).exists());
        assert!(!output.exists());
    }
}
