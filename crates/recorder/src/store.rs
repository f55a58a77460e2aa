// Per-session segment storage.

use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    RecorderError,
    output::ensure_dir,
    segment::{Segment, SegmentTimestamp},
};

/// Suffix of files that are still being written.
pub const PART_SUFFIX: &str = "part";

/// Name of the ffmpeg concat list written next to the segments.
pub const CONCAT_LIST_FILE: &str = "concat_list.txt";

/// Retrieved segments of one session, keyed by timestamp.
///
/// Insert-only: a timestamp that has been stored is never replaced or
/// removed until [`SegmentStore::cleanup`] discards the whole session.
#[derive(Debug)]
pub struct SegmentStore {
    dir: PathBuf,
    extension: String,
    retrieved: BTreeMap<SegmentTimestamp, Segment>,
}

impl SegmentStore {
    /// Opens a store in `dir`, creating the directory.
    pub async fn create(dir: impl AsRef<Path>, extension: &str) -> Result<Self, RecorderError> {
        let dir = ensure_dir(dir).await?;
        Ok(Self {
            dir,
            extension: extension.trim_start_matches('.').to_string(),
            retrieved: BTreeMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn contains(&self, timestamp: &SegmentTimestamp) -> bool {
        self.retrieved.contains_key(timestamp)
    }

    /// Final location of the segment file for `timestamp`.
    pub fn path_for(&self, timestamp: &SegmentTimestamp) -> PathBuf {
        self.dir
            .join(format!("{}.{}", timestamp.file_stem(), self.extension))
    }

    /// Location the segment is written to before it is complete.
    pub fn part_path_for(&self, timestamp: &SegmentTimestamp) -> PathBuf {
        self.dir.join(format!(
            "{}.{}.{PART_SUFFIX}",
            timestamp.file_stem(),
            self.extension
        ))
    }

    /// Records a retrieved segment. Returns false, keeping the existing
    /// entry, when the timestamp is already present.
    pub fn insert(&mut self, segment: Segment) -> bool {
        if self.retrieved.contains_key(&segment.timestamp) {
            return false;
        }
        self.retrieved.insert(segment.timestamp.clone(), segment);
        true
    }

    pub fn len(&self) -> usize {
        self.retrieved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retrieved.is_empty()
    }

    /// Segments in ascending timestamp order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.retrieved.values()
    }

    pub fn sorted_paths(&self) -> Vec<PathBuf> {
        self.retrieved
            .values()
            .map(|segment| segment.local_path.clone())
            .collect()
    }

    pub fn total_bytes(&self) -> u64 {
        self.retrieved.values().map(|segment| segment.bytes).sum()
    }

    /// Removes segment files, leftover partial files, the concat list and
    /// finally the session directory.
    pub async fn cleanup(&self) -> Result<(), RecorderError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() || !self.is_session_file(&path) {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temporary file"),
            }
        }

        debug!(dir = %self.dir.display(), removed, "Removed temporary segment files");

        match tokio::fs::remove_dir(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RecorderError::IoError(io::Error::new(
                e.kind(),
                format!("failed to remove {}: {e}", self.dir.display()),
            ))),
        }
    }

    fn is_session_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        name == CONCAT_LIST_FILE
            || path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| ext == self.extension || ext == PART_SUFFIX)
    }
}
