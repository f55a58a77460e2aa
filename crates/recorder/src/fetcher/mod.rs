// Segment download step.

pub mod ffmpeg;
pub mod http;

use std::{io, path::Path};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    RecorderError,
    headers::HeaderBlock,
    segment::{Segment, SegmentEntry},
    store::SegmentStore,
};

pub use ffmpeg::FfmpegSegmentFetcher;
pub use http::HttpSegmentFetcher;

/// Writes one segment to a local file.
#[async_trait]
pub trait SegmentFetcher: Send + Sync {
    /// Fetches `entry` into `destination` and returns the number of bytes
    /// written. On error the destination may hold partial data.
    async fn fetch(
        &self,
        entry: &SegmentEntry,
        destination: &Path,
        headers: &HeaderBlock,
    ) -> Result<u64, RecorderError>;
}

/// Result of a single download attempt.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The timestamp was already retrieved; nothing was requested.
    Skipped,
    Retrieved(Segment),
    /// The attempt failed. The timestamp stays absent from the store.
    Failed(RecorderError),
}

/// Downloads `entry` unless its timestamp is already in `store`.
///
/// Data goes to a `.part` file that is renamed into place only once the
/// fetch succeeded, so the store directory never holds a truncated segment
/// under its final name. The caller inserts the returned segment.
pub async fn try_download(
    store: &SegmentStore,
    fetcher: &dyn SegmentFetcher,
    entry: &SegmentEntry,
    headers: &HeaderBlock,
) -> DownloadOutcome {
    if store.contains(&entry.timestamp) {
        return DownloadOutcome::Skipped;
    }

    let part_path = store.part_path_for(&entry.timestamp);
    let final_path = store.path_for(&entry.timestamp);

    let result = match fetcher.fetch(entry, &part_path, headers).await {
        Ok(bytes) => tokio::fs::rename(&part_path, &final_path)
            .await
            .map(|()| bytes)
            .map_err(RecorderError::from),
        Err(e) => Err(e),
    };

    match result {
        Ok(bytes) => {
            debug!(timestamp = %entry.timestamp, bytes, "Segment retrieved");
            DownloadOutcome::Retrieved(Segment {
                timestamp: entry.timestamp.clone(),
                source_uri: entry.uri.clone(),
                local_path: final_path,
                bytes,
            })
        }
        Err(e) => {
            warn!(timestamp = %entry.timestamp, uri = %entry.uri, error = %e, "Segment download failed");
            remove_partial(&part_path).await;
            DownloadOutcome::Failed(e)
        }
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial segment"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct WritingFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SegmentFetcher for WritingFetcher {
        async fn fetch(
            &self,
            _entry: &SegmentEntry,
            destination: &Path,
            _headers: &HeaderBlock,
        ) -> Result<u64, RecorderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(destination, b"partial").await?;
            if self.fail {
                Err(RecorderError::StatusCode(reqwest::StatusCode::NOT_FOUND))
            } else {
                Ok(7)
            }
        }
    }

    #[tokio::test]
    async fn success_renames_part_file() {
        let root = tempfile::tempdir().unwrap();
        let store = SegmentStore::create(root.path(), "aac").await.unwrap();
        let fetcher = WritingFetcher {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let entry = SegmentEntry::new("1000", "https://media.example/1000.aac");

        let outcome = try_download(&store, &fetcher, &entry, &HeaderBlock::default()).await;
        let DownloadOutcome::Retrieved(segment) = outcome else {
            panic!("expected a retrieved segment, got {outcome:?}");
        };
        assert_eq!(segment.bytes, 7);
        assert_eq!(segment.local_path, root.path().join("1000.aac"));
        assert!(segment.local_path.exists());
        assert!(!store.part_path_for(&entry.timestamp).exists());
    }

    #[tokio::test]
    async fn failure_removes_part_file() {
        let root = tempfile::tempdir().unwrap();
        let store = SegmentStore::create(root.path(), "aac").await.unwrap();
        let fetcher = WritingFetcher {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let entry = SegmentEntry::new("1000", "https://media.example/1000.aac");

        let outcome = try_download(&store, &fetcher, &entry, &HeaderBlock::default()).await;
        assert!(matches!(outcome, DownloadOutcome::Failed(_)));
        assert!(!store.part_path_for(&entry.timestamp).exists());
        assert!(!store.path_for(&entry.timestamp).exists());
    }

    #[tokio::test]
    async fn retrieved_timestamp_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        let mut store = SegmentStore::create(root.path(), "aac").await.unwrap();
        let fetcher = WritingFetcher {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let entry = SegmentEntry::new("1000", "https://media.example/1000.aac");

        if let DownloadOutcome::Retrieved(segment) =
            try_download(&store, &fetcher, &entry, &HeaderBlock::default()).await
        {
            store.insert(segment);
        }
        let outcome = try_download(&store, &fetcher, &entry, &HeaderBlock::default()).await;
        assert!(matches!(outcome, DownloadOutcome::Skipped));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
