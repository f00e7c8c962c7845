//! End-to-end runs against a real ffmpeg. Run with `--ignored`.

use crate::support::{range, secs};
use ffmpeg_sidecar::command::FfmpegCommand;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use trimkit_editor::{ExportOutcome, ExportPipeline, ExportRequest};
use trimkit_core::TrimError;
use trimkit_media::{
    compose, FfmpegTranscoder, FileAsset, MediaProbe, PresetId, SourceAsset, TranscodeProfile,
    TranscodeRequest, Transcoder,
};

/// Render a 4 s test pattern with a sine tone.
fn generate_clip(dir: &Path) -> PathBuf {
    let path = dir.join("pattern.mp4");
    let mut child = FfmpegCommand::new()
        .overwrite()
        .args(["-f", "lavfi", "-i", "testsrc=duration=4:size=320x240:rate=25"])
        .args(["-f", "lavfi", "-i", "sine=frequency=440:duration=4"])
        .args(["-shortest", "-c:v", "libx264", "-g", "25", "-pix_fmt", "yuv420p", "-c:a", "aac"])
        .arg(&path)
        .spawn()
        .unwrap();
    // Drain ffmpeg's output so it cannot block on a full pipe.
    child.iter().unwrap().for_each(drop);
    let status = child.wait().unwrap();
    assert!(status.success());
    path
}

async fn export(source: Arc<dyn SourceAsset>, preset: Option<PresetId>, output: PathBuf) -> ExportOutcome {
    let playable = compose(Arc::clone(&source), range(secs(1), secs(3))).await.unwrap();
    let request = ExportRequest::for_playable(&playable, preset, output);
    ExportPipeline::new(Arc::new(FfmpegTranscoder::new()))
        .with_progress_interval(Duration::from_millis(50))
        .start(request)
        .finish(|_| {})
        .await
}

#[tokio::test]
#[ignore = "needs ffmpeg on PATH"]
async fn test_probe_and_passthrough_export() {
    let dir = tempfile::tempdir().unwrap();
    let clip = generate_clip(dir.path());
    let source: Arc<dyn SourceAsset> = Arc::new(FileAsset::open(&clip));

    let duration = source.full_duration().await.unwrap().to_seconds_f64();
    assert!((duration - 4.0).abs() < 0.1, "duration {duration}");
    assert!(source.first_video_track().await.unwrap().is_some());

    let output = dir.path().join("out").join("copy.mp4");
    let outcome = export(source, None, output.clone()).await;
    assert_eq!(outcome, ExportOutcome::Succeeded(output.clone()));

    let probed = MediaProbe::probe(&output).unwrap();
    let seconds = probed.duration.to_seconds_f64();
    assert!(seconds > 1.5 && seconds < 3.5, "exported {seconds}s");
}

#[tokio::test]
#[ignore = "needs ffmpeg on PATH"]
async fn test_preset_export_is_scaled_and_trimmed() {
    let dir = tempfile::tempdir().unwrap();
    let clip = generate_clip(dir.path());
    let source: Arc<dyn SourceAsset> = Arc::new(FileAsset::open(&clip));

    let output = dir.path().join("small.mp4");
    let outcome = export(source, Some(PresetId::Vga640x480), output.clone()).await;
    assert_eq!(outcome, ExportOutcome::Succeeded(output.clone()));

    let probed = MediaProbe::probe(&output).unwrap();
    assert!((probed.duration.to_seconds_f64() - 2.0).abs() < 0.2);
    let video = probed.primary_video().unwrap();
    assert!(video.width <= 640 && video.height <= 480);
}

#[cfg(unix)]
#[tokio::test]
#[ignore = "needs ffmpeg and mkfifo on PATH"]
async fn test_abort_kills_silent_ffmpeg() {
    let dir = tempfile::tempdir().unwrap();
    // Nobody writes to the fifo, so ffmpeg blocks opening it without output.
    let fifo = dir.path().join("stalled.mp4");
    let status = std::process::Command::new("mkfifo").arg(&fifo).status().unwrap();
    assert!(status.success());

    let job = FfmpegTranscoder::new()
        .start(TranscodeRequest {
            source_path: fifo,
            range: range(secs(0), secs(2)),
            profile: TranscodeProfile::Passthrough,
            output_path: dir.path().join("never.mp4"),
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    job.abort.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), job.done)
        .await
        .expect("ffmpeg was not killed")
        .unwrap();
    assert_eq!(result, Err(TrimError::Cancelled));
}
