//! TrimKit - trim a video file from the command line
//!
//! Entry point: opens an editing session on the input, selects the
//! requested range and exports it.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use trimkit_core::{RationalTime, TimeRange};
use trimkit_editor::{
    EditSession, EditorConfig, HeadlessPlayer, Player, SessionOutcome, SessionReceiver,
};
use trimkit_media::{FfmpegTranscoder, FileAsset, PresetId, SourceAsset, TrackKind};

/// Trim a video file and export the selection
#[derive(Parser, Debug)]
#[command(name = "trimkit", version, about, long_about = None)]
struct Args {
    /// Video file to trim
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Selection start in seconds
    #[arg(long, value_name = "SECONDS")]
    start: Option<f64>,

    /// Selection end in seconds (default: start plus the maximum duration)
    #[arg(long, value_name = "SECONDS")]
    end: Option<f64>,

    /// Export preset: high, medium, low, 640x480, 960x540 or 1280x720
    #[arg(long, value_name = "PRESET", value_parser = str::parse::<PresetId>)]
    preset: Option<PresetId>,

    /// Directory for exported files
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// JSON editor configuration
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn build_config(args: &Args) -> Result<EditorConfig> {
    let mut config = match &args.config {
        Some(path) => EditorConfig::load_from_file(path)?,
        None => EditorConfig::default(),
    };
    if args.preset.is_some() {
        config.preset = args.preset;
    }
    if args.output_dir.is_some() {
        config.output_dir = args.output_dir.clone();
    }
    if args.start.is_some() || args.end.is_some() {
        let start = RationalTime::from_seconds_f64(args.start.unwrap_or(0.0));
        let end = match args.end {
            Some(end) => RationalTime::from_seconds_f64(end),
            None => start + config.maximum_duration,
        };
        if end <= start {
            bail!("--end must be after --start");
        }
        config.initial_selected_range = Some(TimeRange::from_start_end(start, end));
    }
    config.validate()?;
    Ok(config)
}

async fn log_source(source: &FileAsset) {
    let Ok(probe) = source.probe().await else {
        return;
    };
    let video = probe.primary_video();
    let orientation = probe
        .tracks
        .iter()
        .find(|t| t.kind == TrackKind::Video)
        .map(|t| t.orientation)
        .unwrap_or_default();
    if let Some(video) = video {
        let (width, height) = orientation.display_size(video.width, video.height);
        info!(
            format = %probe.format,
            width,
            height,
            rotation = orientation.rotation_degrees(),
            "Source video"
        );
    }
}

/// Export the selection and wait for the session outcome.
///
/// A cancel that lands before the export starts finishes the session
/// first. `save` then refuses to run, and the cancelled outcome is still
/// waiting on `outcome`.
async fn export<P: Player>(
    session: &mut EditSession<P>,
    outcome: SessionReceiver,
) -> Result<SessionOutcome> {
    let saved = session
        .save(|fraction| {
            eprint!("\rExporting {:>3.0}%", fraction * 100.0);
            let _ = std::io::stderr().flush();
        })
        .await;
    eprintln!();
    if let Err(e) = saved {
        if !session.is_finished() {
            return Err(e.into());
        }
        debug!(error = %e, "Session finished before export");
    }
    outcome.await.context("session ended without an outcome")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = build_config(&args)?;

    if !trimkit_media::ffmpeg_available() {
        bail!("ffmpeg was not found on PATH");
    }

    let source = Arc::new(FileAsset::open(&args.input));
    let (mut session, outcome) = EditSession::open(
        config,
        Arc::clone(&source) as Arc<dyn SourceAsset>,
        HeadlessPlayer::new(),
        Arc::new(FfmpegTranscoder::new()),
    )
    .await
    .with_context(|| format!("cannot open {}", args.input.display()))?;

    log_source(&source).await;
    if session.next_recomposition().await.is_some() {
        info!(range = %session.selected_range(), "Preview ready");
    }

    let cancel = session.export_cancel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling export");
            cancel.cancel();
        }
    });

    match export(&mut session, outcome).await? {
        SessionOutcome::Saved { path, range } => {
            info!(range = %range, "Saved");
            println!("{}", path.display());
            Ok(())
        }
        SessionOutcome::Failed(e) => Err(e.into()),
        SessionOutcome::Cancelled => bail!("cancelled"),
    }
}
