//! Transcoding ranges of a source file to an output file.
//!
//! Uses FFmpeg via the sidecar process. Supports quality presets, a
//! pass-through profile, progress reporting, and cancellation.

use async_trait::async_trait;
use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};
use trimkit_core::{RationalTime, Result, TimeRange, TrimError};

// ── Presets ─────────────────────────────────────────────────────

/// Export quality preset chosen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetId {
    High,
    Medium,
    Low,
    #[serde(rename = "640x480")]
    Vga640x480,
    #[serde(rename = "1280x720")]
    Hd1280x720,
    #[serde(rename = "960x540")]
    Qhd960x540,
}

impl PresetId {
    pub const ALL: [PresetId; 6] = [
        Self::High,
        Self::Medium,
        Self::Low,
        Self::Vga640x480,
        Self::Hd1280x720,
        Self::Qhd960x540,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Vga640x480 => "640x480",
            Self::Hd1280x720 => "1280x720",
            Self::Qhd960x540 => "960x540",
        }
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PresetId {
    type Err = TrimError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| TrimError::InvalidParameter(format!("Unknown preset: {s}")))
    }
}

/// Video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    H264,
}

impl VideoCodec {
    /// FFmpeg encoder name.
    pub fn ffmpeg_encoder(self) -> &'static str {
        match self {
            Self::H264 => "libx264",
        }
    }
}

/// Audio codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCodec {
    Aac,
}

impl AudioCodec {
    /// FFmpeg encoder name.
    pub fn ffmpeg_encoder(self) -> &'static str {
        match self {
            Self::Aac => "aac",
        }
    }
}

/// Re-encode settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeSettings {
    pub video_codec: VideoCodec,
    pub audio_codec: AudioCodec,
    /// CRF value (0-51, lower = better).
    pub crf: u32,
    /// Audio bitrate in kbps.
    pub audio_bitrate: u32,
    /// Bounding box the displayed frame is scaled down to fit.
    pub max_size: Option<(u32, u32)>,
}

impl EncodeSettings {
    fn quality(video_codec: VideoCodec, crf: u32, audio_bitrate: u32) -> Self {
        Self {
            video_codec,
            audio_codec: AudioCodec::Aac,
            crf,
            audio_bitrate,
            max_size: None,
        }
    }

    fn sized(width: u32, height: u32) -> Self {
        Self {
            max_size: Some((width, height)),
            ..Self::quality(VideoCodec::H264, 23, 128)
        }
    }
}

/// How the output is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscodeProfile {
    /// Stream copy, no re-encode.
    Passthrough,
    Encode(EncodeSettings),
}

impl TranscodeProfile {
    /// Profile for a preset; no preset means pass-through.
    pub fn resolve(preset: Option<PresetId>) -> Self {
        let Some(preset) = preset else {
            return Self::Passthrough;
        };
        Self::Encode(match preset {
            PresetId::High => EncodeSettings::quality(VideoCodec::H264, 18, 192),
            PresetId::Medium => EncodeSettings::quality(VideoCodec::H264, 23, 128),
            PresetId::Low => EncodeSettings::quality(VideoCodec::H264, 30, 64),
            PresetId::Vga640x480 => EncodeSettings::sized(640, 480),
            PresetId::Hd1280x720 => EncodeSettings::sized(1280, 720),
            PresetId::Qhd960x540 => EncodeSettings::sized(960, 540),
        })
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Passthrough)
    }
}

// ── Transcode job ───────────────────────────────────────────────

/// One transcode: a range of a source file written to an output file.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeRequest {
    pub source_path: PathBuf,
    pub range: TimeRange,
    pub profile: TranscodeProfile,
    pub output_path: PathBuf,
}

fn seconds_arg(time: RationalTime) -> String {
    format!("{:.6}", time.to_seconds_f64())
}

impl TranscodeRequest {
    /// Build the FFmpeg command arguments.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-ss".into(),
            seconds_arg(self.range.start),
            "-i".into(),
            self.source_path.to_string_lossy().into_owned(),
            "-t".into(),
            seconds_arg(self.range.duration),
            "-map".into(),
            "0:v?".into(),
            "-map".into(),
            "0:a?".into(),
        ];

        match &self.profile {
            TranscodeProfile::Passthrough => {
                args.extend_from_slice(&["-c".into(), "copy".into()]);
            }
            TranscodeProfile::Encode(settings) => {
                if let Some((w, h)) = settings.max_size {
                    args.extend_from_slice(&[
                        "-vf".into(),
                        format!(
                            "scale=w={w}:h={h}:force_original_aspect_ratio=decrease:force_divisible_by=2"
                        ),
                    ]);
                }
                args.extend_from_slice(&[
                    "-c:v".into(),
                    settings.video_codec.ffmpeg_encoder().into(),
                    "-crf".into(),
                    settings.crf.to_string(),
                    "-pix_fmt".into(),
                    "yuv420p".into(),
                    "-c:a".into(),
                    settings.audio_codec.ffmpeg_encoder().into(),
                    "-b:a".into(),
                    format!("{}k", settings.audio_bitrate),
                ]);
            }
        }

        args.extend_from_slice(&["-movflags".into(), "+faststart".into()]);
        args.push(self.output_path.to_string_lossy().into_owned());
        args
    }
}

/// Shared completion fraction of a running transcode, in `0.0..=1.0`.
#[derive(Debug, Clone, Default)]
pub struct TranscodeProgress(Arc<AtomicU32>);

impl TranscodeProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, fraction: f32) {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        self.0.store(fraction.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Handle for cancelling an in-progress export.
///
/// Clones share one flag. Besides polling, tasks can await
/// [`cancelled`](Self::cancelled).
#[derive(Debug, Clone)]
pub struct ExportCancel(Arc<watch::Sender<bool>>);

impl ExportCancel {
    /// Create a new cancel handle.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self(Arc::new(tx))
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation has been signalled.
    pub async fn cancelled(&self) {
        let mut rx = self.0.subscribe();
        // The sender lives in `self`, so this only returns on cancellation.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for ExportCancel {
    fn default() -> Self {
        Self::new()
    }
}

/// A started transcode.
#[derive(Debug)]
pub struct TranscodeJob {
    pub progress: TranscodeProgress,
    /// Stops the backend when cancelled.
    pub abort: ExportCancel,
    /// Resolves when the backend finishes.
    pub done: oneshot::Receiver<Result<()>>,
}

/// Backend that performs transcodes.
#[async_trait]
pub trait Transcoder: Send + Sync + fmt::Debug {
    async fn start(&self, request: TranscodeRequest) -> Result<TranscodeJob>;
}

/// Parse an FFmpeg `time=` value (`HH:MM:SS.ss`) into seconds.
pub fn parse_ffmpeg_time(text: &str) -> Option<f64> {
    let text = text.trim();
    // FFmpeg reports negative times before the first output packet.
    if text.starts_with('-') {
        return None;
    }
    let mut parts = text.rsplitn(3, ':');
    let seconds: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next().map_or(Ok(0.0), str::parse::<f64>).ok()?;
    let hours: f64 = parts.next().map_or(Ok(0.0), str::parse::<f64>).ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// [`Transcoder`] backed by the `ffmpeg` executable.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder;

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self
    }

    fn run(
        request: &TranscodeRequest,
        progress: &TranscodeProgress,
        abort: &ExportCancel,
        spawned: oneshot::Sender<SharedChild>,
    ) -> Result<()> {
        let args = request.ffmpeg_args();
        debug!(?args, "Spawning ffmpeg");

        let mut child = FfmpegCommand::new()
            .args(&args)
            .spawn()
            .map_err(|e| TrimError::ExportFailed(format!("Failed to spawn ffmpeg: {e}")))?;

        let total = request.range.duration.to_seconds_f64();
        let mut last_error: Option<String> = None;

        let events = child
            .iter()
            .map_err(|e| TrimError::ExportFailed(format!("Failed to read ffmpeg output: {e}")))?;

        // From here the abort watcher can kill ffmpeg even while the event
        // iterator is blocked on a silent pipe.
        let child: SharedChild = Arc::new(Mutex::new(child));
        let _ = spawned.send(Arc::clone(&child));
        if abort.is_cancelled() {
            let _ = child.lock().kill();
        }

        for event in events {
            if abort.is_cancelled() {
                break;
            }
            match event {
                FfmpegEvent::Progress(p) => {
                    if let Some(seconds) = parse_ffmpeg_time(&p.time) {
                        if total > 0.0 {
                            progress.set((seconds / total) as f32);
                        }
                    }
                }
                FfmpegEvent::Error(msg) | FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, msg) => {
                    last_error = Some(msg);
                }
                _ => {}
            }
        }

        let mut child = child.lock();
        if abort.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(TrimError::Cancelled);
        }
        let status = child
            .wait()
            .map_err(|e| TrimError::ExportFailed(format!("Failed to wait for ffmpeg: {e}")))?;

        if abort.is_cancelled() {
            return Err(TrimError::Cancelled);
        }
        if !status.success() {
            return Err(TrimError::ExportFailed(match last_error {
                Some(msg) => format!("ffmpeg exited with {status}: {msg}"),
                None => format!("ffmpeg exited with {status}"),
            }));
        }

        progress.set(1.0);
        Ok(())
    }
}

type SharedChild = Arc<Mutex<FfmpegChild>>;

/// Kill the ffmpeg child as soon as `abort` fires, until `finished`.
async fn watch_abort(
    abort: ExportCancel,
    spawned: oneshot::Receiver<SharedChild>,
    finished: oneshot::Receiver<()>,
) {
    let Ok(child) = spawned.await else {
        return;
    };
    tokio::select! {
        _ = abort.cancelled() => {
            debug!("Abort requested, killing ffmpeg");
            let _ = child.lock().kill();
        }
        _ = finished => {}
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn start(&self, request: TranscodeRequest) -> Result<TranscodeJob> {
        let progress = TranscodeProgress::new();
        let abort = ExportCancel::new();
        let (tx, done) = oneshot::channel();
        let (spawned_tx, spawned_rx) = oneshot::channel();
        let (finished_tx, finished_rx) = oneshot::channel();

        info!(
            source = %request.source_path.display(),
            output = %request.output_path.display(),
            range = %request.range,
            passthrough = request.profile.is_passthrough(),
            "Starting transcode"
        );

        tokio::spawn(watch_abort(abort.clone(), spawned_rx, finished_rx));

        let (job_progress, job_abort) = (progress.clone(), abort.clone());
        tokio::task::spawn_blocking(move || {
            let result = Self::run(&request, &job_progress, &job_abort, spawned_tx);
            let _ = finished_tx.send(());
            if let Err(e) = &result {
                if !e.is_cancelled() {
                    warn!(error = %e, "Transcode failed");
                }
            }
            let _ = tx.send(result);
        });

        Ok(TranscodeJob {
            progress,
            abort,
            done,
        })
    }
}
