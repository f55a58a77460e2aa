use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use radiorec_engine::{ConcatOutcome, RecorderEvent};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use super::format_bytes;

fn recording_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

#[derive(Debug, Default)]
struct Counters {
    segments: usize,
    failed: usize,
    unavailable: u32,
    bytes: u64,
}

impl Counters {
    fn message(&self) -> String {
        let mut message = format!(
            "{} segments, {}",
            self.segments,
            format_bytes(self.bytes)
        );
        if self.failed > 0 {
            message.push_str(&format!(", {} failed", self.failed));
        }
        if self.unavailable > 0 {
            message.push_str(&format!(", playlist unavailable x{}", self.unavailable));
        }
        message
    }
}

/// Spinner that follows the recorder's events.
#[derive(Clone)]
pub struct ProgressManager {
    multi: MultiProgress,
    bar: Arc<Mutex<Option<ProgressBar>>>,
    counters: Arc<Mutex<Counters>>,
    disabled: bool,
}

impl ProgressManager {
    pub fn new(multi: MultiProgress) -> Self {
        Self {
            multi,
            bar: Arc::new(Mutex::new(None)),
            counters: Arc::new(Mutex::new(Counters::default())),
            disabled: false,
        }
    }

    pub fn new_disabled(multi: MultiProgress) -> Self {
        Self {
            disabled: true,
            ..Self::new(multi)
        }
    }

    pub fn handle_event(&self, event: RecorderEvent) {
        if self.disabled {
            return;
        }

        let (Ok(mut bar), Ok(mut counters)) = (self.bar.lock(), self.counters.lock()) else {
            return;
        };

        match event {
            RecorderEvent::PlaylistResolved { refreshed: false, .. } => {
                let spinner = self.multi.add(ProgressBar::new_spinner());
                spinner.set_style(recording_style());
                spinner.set_message("Waiting for segments");
                spinner.enable_steady_tick(Duration::from_millis(200));
                *bar = Some(spinner);
            }
            RecorderEvent::PlaylistResolved { refreshed: true, .. } => {}
            RecorderEvent::SegmentRetrieved { bytes, .. } => {
                counters.segments += 1;
                counters.bytes += bytes;
                counters.unavailable = 0;
            }
            RecorderEvent::SegmentFailed { .. } => counters.failed += 1,
            RecorderEvent::PlaylistUnavailable { consecutive, .. } => {
                counters.unavailable = consecutive;
            }
            RecorderEvent::PollCompleted { .. } => counters.unavailable = 0,
            RecorderEvent::ConcatenationFinished { output, outcome } => {
                if let Some(spinner) = bar.take() {
                    let message = match outcome {
                        ConcatOutcome::Completed(summary) => format!(
                            "Saved {} ({})",
                            output.display(),
                            format_bytes(summary.bytes_written)
                        ),
                        ConcatOutcome::Skipped => "No segments recorded".to_string(),
                        ConcatOutcome::Failed(reason) => format!("Merge failed: {reason}"),
                    };
                    spinner.finish_with_message(message);
                }
                return;
            }
        }

        if let Some(spinner) = bar.as_ref() {
            spinner.set_message(counters.message());
        }
    }

    #[inline]
    #[allow(unused)]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }
}
