use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use crate::{concat::ConcatOutcome, segment::SegmentTimestamp};

/// Progress notifications emitted while a session runs.
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// The media playlist URL was resolved or refreshed.
    PlaylistResolved {
        /// The media playlist URL now in use.
        url: Url,
        /// True for re-resolutions after the initial one.
        refreshed: bool,
    },
    /// A poll listed the playlist and finished its downloads.
    PollCompleted {
        /// Entries in the listing.
        listed: usize,
        /// Segments downloaded by this poll.
        retrieved: usize,
        /// Segments retrieved since the session started.
        total_retrieved: usize,
    },
    /// The media playlist could not be listed.
    PlaylistUnavailable {
        /// Why the listing failed.
        reason: String,
        /// Unavailable polls in a row, this one included.
        consecutive: u32,
    },
    /// A segment was stored.
    SegmentRetrieved {
        /// Identity of the segment.
        timestamp: SegmentTimestamp,
        /// Size of the segment file.
        bytes: u64,
    },
    /// A segment download failed and will be retried if still listed.
    SegmentFailed {
        /// Identity of the segment.
        timestamp: SegmentTimestamp,
        /// The failure.
        reason: String,
    },
    /// The merge step ran, or was skipped.
    ConcatenationFinished {
        /// Output file.
        output: PathBuf,
        /// How the merge went.
        outcome: ConcatOutcome,
    },
}

/// Receives [`RecorderEvent`]s.
pub type EventCallback = Arc<dyn Fn(RecorderEvent) + Send + Sync>;
