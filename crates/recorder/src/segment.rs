use std::{fmt, path::PathBuf};

use chrono::{DateTime, FixedOffset, Utc};

/// Sortable identity of a segment.
///
/// Tokens derived from a program date-time are UTC and zero padded, so the
/// lexicographic order is the chronological one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentTimestamp(String);

impl SegmentTimestamp {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn from_program_date_time(date_time: &DateTime<FixedOffset>) -> Self {
        Self(
            date_time
                .with_timezone(&Utc)
                .format("%Y%m%dT%H%M%S%.3fZ")
                .to_string(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The token reduced to characters that are safe in a file name.
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for SegmentTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SegmentTimestamp {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// A manifest entry: when the segment starts and where to fetch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentEntry {
    pub timestamp: SegmentTimestamp,
    pub uri: String,
}

impl SegmentEntry {
    pub fn new(timestamp: impl Into<SegmentTimestamp>, uri: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            uri: uri.into(),
        }
    }
}

/// A segment that has been written to the session directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub timestamp: SegmentTimestamp,
    pub source_uri: String,
    pub local_path: PathBuf,
    pub bytes: u64,
}
