use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use error::AppError;
use indicatif::MultiProgress;
use radiorec_engine::{ConcatOutcome, Recorder, RecordingRequest, StaticHeaders, output_path};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;

mod cli;
mod config;
mod error;
mod utils;

use cli::CliArgs;
use utils::progress::ProgressManager;
use utils::{authentication_headers, format_bytes, format_duration, parse_duration};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    // .env is optional; real environment variables take precedence
    let _ = dotenvy::dotenv();

    let args = CliArgs::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    if let Some(parent) = args.log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.log_file)?;
    let (file_writer, _log_guard) = tracing_appender::non_blocking(log_file);

    let multi_writer = MakeWriterExt::and(std::io::stdout, file_writer);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(multi_writer)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    info!("██████╗  █████╗ ██████╗ ██╗ ██████╗ ██████╗ ███████╗ ██████╗");
    info!("██╔══██╗██╔══██╗██╔══██╗██║██╔═══██╗██╔══██╗██╔════╝██╔════╝");
    info!("██████╔╝███████║██║  ██║██║██║   ██║██████╔╝█████╗  ██║     ");
    info!("██╔══██╗██╔══██║██║  ██║██║██║   ██║██╔══██╗██╔══╝  ██║     ");
    info!("██║  ██║██║  ██║██████╔╝██║╚██████╔╝██║  ██║███████╗╚██████╗");
    info!("╚═╝  ╚═╝╚═╝  ╚═╝╚═════╝ ╚═╝ ╚═════╝ ╚═╝  ╚═╝╚══════╝ ╚═════╝");
    info!("");
    info!("Radiorec - Live Radio Recorder");
    info!("==================================================================");

    let duration = parse_duration(&args.duration)?;
    let config = config::recorder_config(&args)?;

    info!(
        "HTTP timeout configuration: overall={}s, connect={}s",
        args.timeout, args.connect_timeout
    );
    info!(
        segment_backend = %config.segment_backend,
        concat_backend = %config.concat_backend,
        concurrency = config.download_concurrency,
        "Recorder configuration"
    );

    let headers = authentication_headers(&args.headers, &args.area_id, args.auth_token.as_deref());
    if args.auth_token.is_none() {
        warn!("No authentication token configured, the upstream may refuse the playlist");
    }

    let started_at = Utc::now();
    let output = output_path(
        &args.output_dir,
        &args.station,
        &args.program,
        started_at,
        config.timezone,
        &config.output_extension,
    );

    info!(
        station = %args.station,
        program = %args.program,
        duration = %format_duration(duration.as_secs_f64()),
        output = %output.display(),
        "Starting recording"
    );

    let multi = MultiProgress::new();
    let progress_manager = if args.show_progress {
        ProgressManager::new(multi)
    } else {
        ProgressManager::new_disabled(multi)
    };

    let recorder = Recorder::new(config, Arc::new(StaticHeaders::new(headers)))?
        .with_event_callback(Arc::new(move |event| {
            progress_manager.handle_event(event);
        }));

    let request = RecordingRequest {
        station: args.station.clone(),
        duration,
        output_path: output,
        temp_root: args.temp_dir.clone(),
    };

    let report = recorder.record(&request).await?;

    info!(
        segments = report.segments,
        failed_downloads = report.failed_downloads,
        polls = report.polls,
        unavailable_polls = report.unavailable_polls,
        reresolutions = report.reresolutions,
        downloaded = %format_bytes(report.bytes_downloaded),
        elapsed = %format_duration(report.elapsed.as_secs_f64()),
        "Recording summary"
    );

    match (&report.output_path, &report.concat) {
        (Some(path), _) => {
            info!(output = %path.display(), "Recording saved");
            Ok(())
        }
        (None, ConcatOutcome::Failed(reason)) => Err(AppError::NoOutput(reason.clone())),
        (None, _) => Err(AppError::NoOutput(
            "no segments were retrieved".to_string(),
        )),
    }
}
