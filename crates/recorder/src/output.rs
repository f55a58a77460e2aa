// Output naming and directory helpers.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::RecorderError;

const OUTPUT_TIME_FORMAT: &str = "%Y%m%d-%H%M";

/// Creates `path` and its parents when missing and returns it.
pub async fn ensure_dir(path: impl AsRef<Path>) -> Result<PathBuf, RecorderError> {
    let path = path.as_ref();
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Creating directory");
    }
    tokio::fs::create_dir_all(path).await.map_err(|e| {
        RecorderError::IoError(std::io::Error::new(
            e.kind(),
            format!("failed to create directory {}: {e}", path.display()),
        ))
    })?;
    Ok(path.to_path_buf())
}

/// Replaces characters that are not allowed in file names on common
/// platforms, and whitespace, with `_`.
pub fn sanitize_file_component(value: &str) -> String {
    let sanitized: String = value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect();
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}

/// `{station}_{program}_{YYYYMMDD-HHMM}.{extension}` with the time rendered
/// in `timezone`.
pub fn output_file_name(
    station: &str,
    program: &str,
    started_at: DateTime<Utc>,
    timezone: Tz,
    extension: &str,
) -> String {
    format!(
        "{}_{}_{}.{}",
        sanitize_file_component(station),
        sanitize_file_component(program),
        started_at.with_timezone(&timezone).format(OUTPUT_TIME_FORMAT),
        extension.trim_start_matches('.')
    )
}

pub fn output_path(
    output_dir: &Path,
    station: &str,
    program: &str,
    started_at: DateTime<Utc>,
    timezone: Tz,
    extension: &str,
) -> PathBuf {
    output_dir.join(output_file_name(
        station, program, started_at, timezone, extension,
    ))
}

/// Per-session temporary directory: `<temp_root>/<output file stem>`.
pub fn session_temp_dir(temp_root: &Path, output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "session".to_string());
    temp_root.join(stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn output_name_uses_configured_timezone() {
        let started_at = Utc.with_ymd_and_hms(2024, 5, 1, 15, 30, 12).unwrap();
        let name = output_file_name("TBS", "Night Show", started_at, chrono_tz::Asia::Tokyo, "aac");
        assert_eq!(name, "TBS_Night_Show_20240502-0030.aac");

        let name = output_file_name("TBS", "news", started_at, chrono_tz::UTC, ".m4a");
        assert_eq!(name, "TBS_news_20240501-1530.m4a");
    }

    #[test]
    fn sanitize_replaces_path_separators() {
        assert_eq!(sanitize_file_component("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_file_component("  "), "_");
        assert_eq!(sanitize_file_component("深夜便"), "深夜便");
    }

    #[test]
    fn session_dir_follows_output_stem() {
        let dir = session_temp_dir(Path::new("/tmp/rec"), Path::new("/out/TBS_x_20240501-0900.aac"));
        assert_eq!(dir, Path::new("/tmp/rec/TBS_x_20240501-0900"));
        let dir = session_temp_dir(Path::new("/tmp/rec"), Path::new("/"));
        assert_eq!(dir, Path::new("/tmp/rec/session"));
    }

    #[tokio::test]
    async fn ensure_dir_creates_nested_directories() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        let created = ensure_dir(&nested).await.unwrap();
        assert_eq!(created, nested);
        assert!(nested.is_dir());
        // Idempotent.
        ensure_dir(&nested).await.unwrap();
    }
}
