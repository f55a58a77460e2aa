// Running the external ffmpeg binary.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::RecorderError;

/// Longest slice of ffmpeg's stderr kept in an error message.
const MAX_STDERR: usize = 1024;

/// An ffmpeg invocation with a bounded run time.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
}

impl FfmpegCommand {
    /// Starts a command line with the flags shared by every invocation.
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: vec!["-y".into(), "-loglevel".into(), "error".into()],
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Runs ffmpeg to completion. A non-zero exit status becomes an error
    /// carrying the tail of stderr.
    pub async fn run(&self) -> Result<(), RecorderError> {
        debug!(program = %self.program.display(), args = ?self.args, "Running ffmpeg");

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RecorderError::FfmpegError(format!(
                    "failed to start {}: {e}",
                    self.program.display()
                ))
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                RecorderError::TimeoutError(format!("ffmpeg did not finish within {:?}", self.timeout))
            })??;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let tail_start = stderr
            .char_indices()
            .rev()
            .nth(MAX_STDERR)
            .map(|(i, _)| i)
            .unwrap_or(0);
        warn!(status = %output.status, stderr = %&stderr[tail_start..], "ffmpeg failed");
        Err(RecorderError::FfmpegError(format!(
            "exited with {}: {}",
            output.status,
            &stderr[tail_start..]
        )))
    }
}

pub fn path_arg(path: &Path) -> OsString {
    path.as_os_str().to_os_string()
}
