//! The recording session: resolve, poll, download, merge, clean up.

use std::{
    collections::HashSet,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use futures::{StreamExt, stream};
use reqwest::header::{CONNECTION, HeaderMap, HeaderValue};
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    FetchOutcome, RecorderError,
    client::create_client,
    concat::{AdtsConcatenator, ConcatOutcome, Concatenator, FfmpegConcatenator},
    config::{ConcatBackend, RecorderConfig, SegmentBackend},
    events::{EventCallback, RecorderEvent},
    fetcher::{
        DownloadOutcome, FfmpegSegmentFetcher, HttpSegmentFetcher, SegmentFetcher, try_download,
    },
    headers::{HeaderBlock, HeaderProvider},
    output::{ensure_dir, session_temp_dir},
    playlist::{HttpPlaylistResolver, HttpSegmentLister, PlaylistResolver, SegmentLister},
    segment::SegmentEntry,
    store::SegmentStore,
};

/// What to record and where to put it.
#[derive(Debug, Clone)]
pub struct RecordingRequest {
    pub station: String,
    pub duration: Duration,
    /// Final output file. Its parent directory is created if needed.
    pub output_path: PathBuf,
    /// Root under which the per-session temporary directory is created.
    pub temp_root: PathBuf,
}

/// Summary of a finished session.
#[derive(Debug, Clone)]
pub struct RecordingReport {
    pub station: String,
    /// Set when an output file was written.
    pub output_path: Option<PathBuf>,
    pub segments: usize,
    pub failed_downloads: usize,
    pub polls: usize,
    pub unavailable_polls: usize,
    pub reresolutions: usize,
    pub bytes_downloaded: u64,
    pub elapsed: Duration,
    pub concat: ConcatOutcome,
}

/// The media playlist currently polled.
#[derive(Debug, Clone)]
struct PlaylistState {
    url: Url,
    resolved_at: Instant,
}

#[derive(Debug, Default)]
struct LoopStats {
    polls: usize,
    unavailable_polls: usize,
    consecutive_unavailable: u32,
    reresolutions: usize,
    failed_downloads: usize,
}

enum LoopPhase {
    Polling,
    Listing,
    Downloading(Vec<SegmentEntry>),
    Done,
}

/// Records live segmented audio for a fixed duration.
pub struct Recorder {
    config: RecorderConfig,
    header_provider: Arc<dyn HeaderProvider>,
    resolver: Arc<dyn PlaylistResolver>,
    lister: Arc<dyn SegmentLister>,
    fetcher: Arc<dyn SegmentFetcher>,
    concatenator: Arc<dyn Concatenator>,
    on_event: Option<EventCallback>,
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("config", &self.config)
            .field("on_event", &self.on_event.is_some())
            .finish_non_exhaustive()
    }
}

impl Recorder {
    /// Builds a recorder whose components follow the configured backends.
    pub fn new(
        config: RecorderConfig,
        header_provider: Arc<dyn HeaderProvider>,
    ) -> Result<Self, RecorderError> {
        config.validate()?;
        let client = create_client(&config.http)?;

        let resolver = Arc::new(HttpPlaylistResolver::new(
            client.clone(),
            config.endpoint.clone(),
        ));
        let lister = Arc::new(HttpSegmentLister::new(client.clone()));

        let fetcher: Arc<dyn SegmentFetcher> = match config.segment_backend {
            SegmentBackend::Native => Arc::new(HttpSegmentFetcher::new(client)),
            SegmentBackend::Ffmpeg => Arc::new(FfmpegSegmentFetcher::new(
                &config.ffmpeg_path,
                config.http.timeout,
            )),
        };

        let concatenator: Arc<dyn Concatenator> = match config.concat_backend {
            ConcatBackend::Native => Arc::new(AdtsConcatenator::new()),
            ConcatBackend::Ffmpeg => Arc::new(FfmpegConcatenator::new(
                &config.ffmpeg_path,
                config.concat_timeout,
            )),
        };

        Ok(Self::with_components(
            config,
            header_provider,
            resolver,
            lister,
            fetcher,
            concatenator,
        ))
    }

    /// Builds a recorder from explicit components.
    pub fn with_components(
        config: RecorderConfig,
        header_provider: Arc<dyn HeaderProvider>,
        resolver: Arc<dyn PlaylistResolver>,
        lister: Arc<dyn SegmentLister>,
        fetcher: Arc<dyn SegmentFetcher>,
        concatenator: Arc<dyn Concatenator>,
    ) -> Self {
        Self {
            config,
            header_provider,
            resolver,
            lister,
            fetcher,
            concatenator,
            on_event: None,
        }
    }

    pub fn with_event_callback(mut self, on_event: EventCallback) -> Self {
        self.on_event = Some(on_event);
        self
    }

    fn emit(&self, event: RecorderEvent) {
        if let Some(on_event) = &self.on_event {
            on_event(event);
        }
    }

    /// Runs one recording session.
    ///
    /// Header and master playlist failures abort before anything is written.
    /// Once the session directory exists, merging and cleanup always run,
    /// even when a fatal listing or refresh error ends the session early;
    /// that error is returned afterwards. Merge failures are reported, not
    /// returned.
    pub async fn record(&self, request: &RecordingRequest) -> Result<RecordingReport, RecorderError> {
        let started = Instant::now();
        let deadline = started.checked_add(request.duration).ok_or_else(|| {
            RecorderError::ConfigError(format!(
                "recording duration {:?} is out of range",
                request.duration
            ))
        })?;
        let station = request.station.as_str();

        let mut headers = self
            .header_provider
            .authenticated_headers()
            .await
            .map_err(|e| match e {
                RecorderError::AuthenticationError(_) => e,
                other => RecorderError::AuthenticationError(other.to_string()),
            })?;
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        let header_block = HeaderBlock::from_header_map(&headers);

        let url = self
            .resolver
            .resolve(station, &headers)
            .await
            .into_result(RecorderError::MasterPlaylistError)?;
        info!(station, url = %url, "Resolved media playlist");
        self.emit(RecorderEvent::PlaylistResolved {
            url: url.clone(),
            refreshed: false,
        });
        let mut playlist = PlaylistState {
            url,
            resolved_at: Instant::now(),
        };

        if let Some(parent) = request.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent).await?;
        }
        let session_dir = session_temp_dir(&request.temp_root, &request.output_path);
        let mut store = SegmentStore::create(&session_dir, &self.config.segment_extension).await?;

        info!(
            station,
            duration = ?request.duration,
            session_dir = %session_dir.display(),
            "Recording started"
        );

        let mut stats = LoopStats::default();
        let loop_result = self
            .run_loop(
                station,
                deadline,
                &headers,
                &header_block,
                &mut playlist,
                &mut store,
                &mut stats,
            )
            .await;

        let concat = self.finish(&store, &request.output_path).await;

        if let Err(e) = store.cleanup().await {
            warn!(dir = %store.dir().display(), error = %e, "Failed to clean up session directory");
        }

        let report = RecordingReport {
            station: request.station.clone(),
            output_path: concat
                .is_completed()
                .then(|| request.output_path.clone()),
            segments: store.len(),
            failed_downloads: stats.failed_downloads,
            polls: stats.polls,
            unavailable_polls: stats.unavailable_polls,
            reresolutions: stats.reresolutions,
            bytes_downloaded: store.total_bytes(),
            elapsed: started.elapsed(),
            concat,
        };

        match loop_result {
            Ok(()) => {
                info!(
                    station,
                    segments = report.segments,
                    failed = report.failed_downloads,
                    polls = report.polls,
                    elapsed = ?report.elapsed,
                    "Recording finished"
                );
                Ok(report)
            }
            Err(e) => {
                error!(station, error = %e, segments = report.segments, "Recording aborted");
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_loop(
        &self,
        station: &str,
        deadline: Instant,
        headers: &HeaderMap,
        header_block: &HeaderBlock,
        playlist: &mut PlaylistState,
        store: &mut SegmentStore,
        stats: &mut LoopStats,
    ) -> Result<(), RecorderError> {
        let mut phase = LoopPhase::Polling;
        loop {
            phase = match phase {
                LoopPhase::Polling => {
                    if Instant::now() > deadline {
                        LoopPhase::Done
                    } else {
                        self.refresh_playlist_if_due(station, headers, playlist, stats)
                            .await?;
                        LoopPhase::Listing
                    }
                }
                LoopPhase::Listing => {
                    stats.polls += 1;
                    match self.lister.list(&playlist.url, headers).await {
                        FetchOutcome::Success(entries) => {
                            stats.consecutive_unavailable = 0;
                            LoopPhase::Downloading(entries)
                        }
                        FetchOutcome::TransientUnavailable { reason } => {
                            stats.unavailable_polls += 1;
                            stats.consecutive_unavailable += 1;
                            debug!(
                                station,
                                reason = %reason,
                                consecutive = stats.consecutive_unavailable,
                                "Media playlist unavailable"
                            );
                            self.emit(RecorderEvent::PlaylistUnavailable {
                                reason,
                                consecutive: stats.consecutive_unavailable,
                            });
                            sleep(self.config.retry_delay).await;
                            LoopPhase::Polling
                        }
                        FetchOutcome::Fatal(e) => return Err(e),
                    }
                }
                LoopPhase::Downloading(entries) => {
                    let listed = entries.len();
                    let retrieved = self
                        .download_listed(entries, header_block, store, stats)
                        .await;
                    self.emit(RecorderEvent::PollCompleted {
                        listed,
                        retrieved,
                        total_retrieved: store.len(),
                    });
                    sleep(self.config.poll_interval).await;
                    LoopPhase::Polling
                }
                LoopPhase::Done => return Ok(()),
            };
        }
    }

    async fn refresh_playlist_if_due(
        &self,
        station: &str,
        headers: &HeaderMap,
        playlist: &mut PlaylistState,
        stats: &mut LoopStats,
    ) -> Result<(), RecorderError> {
        let interval_elapsed = self
            .config
            .playlist_refresh_interval
            .is_some_and(|interval| playlist.resolved_at.elapsed() >= interval);
        let failures = self.config.reresolve_after_failures;
        let streak_reached = failures > 0 && stats.consecutive_unavailable >= failures;
        if !interval_elapsed && !streak_reached {
            return Ok(());
        }

        debug!(station, interval_elapsed, streak_reached, "Refreshing media playlist URL");
        playlist.resolved_at = Instant::now();
        stats.consecutive_unavailable = 0;

        match self.resolver.resolve(station, headers).await {
            FetchOutcome::Success(url) => {
                stats.reresolutions += 1;
                if url != playlist.url {
                    info!(station, url = %url, "Media playlist URL changed");
                }
                playlist.url = url.clone();
                self.emit(RecorderEvent::PlaylistResolved {
                    url,
                    refreshed: true,
                });
            }
            FetchOutcome::TransientUnavailable { reason } => {
                warn!(station, reason = %reason, "Playlist refresh failed, keeping previous URL");
            }
            FetchOutcome::Fatal(e) => {
                error!(station, error = %e, "Playlist refresh failed");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Downloads every listed entry that is not stored yet. Returns the
    /// number of segments added to the store.
    async fn download_listed(
        &self,
        entries: Vec<SegmentEntry>,
        header_block: &HeaderBlock,
        store: &mut SegmentStore,
        stats: &mut LoopStats,
    ) -> usize {
        let mut scheduled = HashSet::new();
        let pending: Vec<SegmentEntry> = entries
            .into_iter()
            .filter(|entry| {
                !store.contains(&entry.timestamp) && scheduled.insert(entry.timestamp.clone())
            })
            .collect();
        if pending.is_empty() {
            return 0;
        }

        let outcomes: Vec<(&SegmentEntry, DownloadOutcome)> = {
            let store_ref: &SegmentStore = store;
            let fetcher = self.fetcher.as_ref();
            stream::iter(pending.iter())
                .map(|entry| async move {
                    (entry, try_download(store_ref, fetcher, entry, header_block).await)
                })
                .buffer_unordered(self.config.download_concurrency.max(1))
                .collect()
                .await
        };

        let mut added = 0;
        for (entry, outcome) in outcomes {
            match outcome {
                DownloadOutcome::Retrieved(segment) => {
                    let bytes = segment.bytes;
                    if store.insert(segment) {
                        added += 1;
                        self.emit(RecorderEvent::SegmentRetrieved {
                            timestamp: entry.timestamp.clone(),
                            bytes,
                        });
                    }
                }
                DownloadOutcome::Failed(e) => {
                    stats.failed_downloads += 1;
                    self.emit(RecorderEvent::SegmentFailed {
                        timestamp: entry.timestamp.clone(),
                        reason: e.to_string(),
                    });
                }
                DownloadOutcome::Skipped => {}
            }
        }
        added
    }

    /// Merges the stored segments into `output`.
    async fn finish(&self, store: &SegmentStore, output: &Path) -> ConcatOutcome {
        let outcome = if store.is_empty() {
            warn!(output = %output.display(), "No segments retrieved, skipping concatenation");
            ConcatOutcome::Skipped
        } else {
            let sorted_paths = store.sorted_paths();
            match self.concatenator.concatenate(&sorted_paths, output).await {
                Ok(summary) => {
                    info!(
                        output = %output.display(),
                        segments = summary.segments,
                        bytes = summary.bytes_written,
                        "Concatenation finished"
                    );
                    ConcatOutcome::Completed(summary)
                }
                Err(e) => {
                    error!(output = %output.display(), error = %e, "Concatenation failed");
                    ConcatOutcome::Failed(e.to_string())
                }
            }
        };

        self.emit(RecorderEvent::ConcatenationFinished {
            output: output.to_path_buf(),
            outcome: outcome.clone(),
        });
        outcome
    }
}
