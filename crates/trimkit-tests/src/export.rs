//! Export through the session and the pipeline with fake backends.

use crate::support::{config, fake_media_file, open, range, scripted, secs};
use std::sync::Arc;
use std::time::Duration;
use trimkit_core::TrimError;
use trimkit_editor::testing::{CopyingTranscoder, GatedAsset};
use trimkit_editor::{ExportOutcome, ExportPipeline, ExportRequest, SessionOutcome};
use trimkit_media::PresetId;

const SOURCE_LEN: usize = 3 * 1024 * 1024;

#[tokio::test]
async fn test_full_selection_exports_without_reencoding() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = fake_media_file(dir.path(), SOURCE_LEN);
    let (transcoder, mut jobs) = scripted();
    let (mut session, rx) = open(
        config(&dir.path().join("out")),
        GatedAsset::at_path(&source_path, secs(5)),
        transcoder,
    )
    .await;

    let backend = tokio::spawn(async move {
        let job = jobs.recv().await.unwrap();
        assert!(job.request.profile.is_passthrough());
        assert_eq!(job.request.range, range(secs(0), secs(5)));
        let bytes = std::fs::read(&job.request.source_path).unwrap();
        job.progress.set(0.5);
        tokio::time::sleep(Duration::from_millis(20)).await;
        job.succeed(&bytes);
    });

    let mut fractions = Vec::new();
    let outcome = session.save(|f| fractions.push(f)).await.unwrap();
    backend.await.unwrap();

    let SessionOutcome::Saved { path, range: saved } = &outcome else {
        panic!("expected save, got {outcome:?}");
    };
    assert_eq!(*saved, range(secs(0), secs(5)));
    assert_eq!(std::fs::metadata(path).unwrap().len(), SOURCE_LEN as u64);
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(fractions.last().copied(), Some(1.0));
    assert_eq!(rx.await.unwrap(), outcome);
}

#[tokio::test]
async fn test_preset_export_reencodes_the_selection() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = fake_media_file(dir.path(), 1024);
    let (transcoder, mut jobs) = scripted();
    let cfg = trimkit_editor::EditorConfig {
        preset: Some(PresetId::Hd1280x720),
        ..config(&dir.path().join("out"))
    };
    let (mut session, _rx) = open(cfg, GatedAsset::at_path(&source_path, secs(10)), transcoder).await;
    session.coordinator_mut().on_range_committed(range(secs(2), secs(4)));

    let backend = tokio::spawn(async move {
        let job = jobs.recv().await.unwrap();
        assert!(!job.request.profile.is_passthrough());
        assert_eq!(job.request.range, range(secs(2), secs(4)));
        job.succeed(b"encoded");
    });
    let outcome = session.save(|_| {}).await.unwrap();
    backend.await.unwrap();
    assert!(matches!(outcome, SessionOutcome::Saved { .. }));
}

#[tokio::test]
async fn test_cancel_at_forty_percent_ends_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let (transcoder, mut jobs) = scripted();
    let output = dir.path().join("cancelled.mp4");
    let pipeline = ExportPipeline::new(transcoder).with_progress_interval(Duration::from_millis(5));
    let mut stream = pipeline.start(ExportRequest {
        source: GatedAsset::ready(secs(10)),
        range: range(secs(1), secs(4)),
        preset: Some(PresetId::Medium),
        output_path: output.clone(),
    });

    let backend = tokio::spawn(async move {
        let job = jobs.recv().await.unwrap();
        job.progress.set(0.4);
        job.abort.cancelled().await;
        // Finishing late must not turn the export into a success.
        job.succeed(b"too late");
    });

    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        if event == ExportOutcome::Progress(0.4) {
            stream.cancel();
        }
        events.push(event);
    }
    backend.await.unwrap();

    assert_eq!(events.last(), Some(&ExportOutcome::Cancelled));
    assert!(!events.iter().any(|e| matches!(e, ExportOutcome::Succeeded(_))));
    assert!(events.iter().any(|e| *e == ExportOutcome::Progress(0.4)));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_copying_backend_reaches_completion() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = fake_media_file(dir.path(), SOURCE_LEN);
    let output = dir.path().join("nested").join("copy.mp4");
    let pipeline = ExportPipeline::new(Arc::new(CopyingTranscoder::default()))
        .with_progress_interval(Duration::from_millis(5));
    let mut stream = pipeline.start(ExportRequest {
        source: GatedAsset::at_path(&source_path, secs(5)),
        range: range(secs(0), secs(5)),
        preset: None,
        output_path: output.clone(),
    });

    let mut last = None;
    let mut reported = 0.0;
    while let Some(event) = stream.next().await {
        if let ExportOutcome::Progress(f) = event {
            assert!(f >= reported);
            reported = f;
        }
        last = Some(event);
    }
    assert_eq!(last, Some(ExportOutcome::Succeeded(output.clone())));
    assert!(std::fs::metadata(&output).unwrap().len() > 0);
}

#[tokio::test]
async fn test_backend_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let (transcoder, mut jobs) = scripted();
    let (mut session, rx) = open(config(dir.path()), GatedAsset::ready(secs(10)), transcoder).await;

    let backend = tokio::spawn(async move {
        let job = jobs.recv().await.unwrap();
        job.fail(TrimError::ExportFailed("disk full".into()));
    });
    let outcome = session.save(|_| {}).await.unwrap();
    backend.await.unwrap();

    assert_eq!(
        outcome,
        SessionOutcome::Failed(TrimError::ExportFailed("disk full".into()))
    );
    assert_eq!(rx.await.unwrap(), outcome);
}

#[tokio::test]
async fn test_session_cancel_wins_over_completion() {
    let dir = tempfile::tempdir().unwrap();
    let (transcoder, mut jobs) = scripted();
    let (mut session, rx) = open(config(dir.path()), GatedAsset::ready(secs(10)), transcoder).await;
    let cancel = session.export_cancel();

    let backend = tokio::spawn(async move {
        let job = jobs.recv().await.unwrap();
        job.progress.set(0.5);
        cancel.cancel();
        job.abort.cancelled().await;
        job.succeed(b"late");
    });
    let outcome = session.save(|_| {}).await.unwrap();
    backend.await.unwrap();

    assert_eq!(outcome, SessionOutcome::Cancelled);
    assert_eq!(rx.await.unwrap(), SessionOutcome::Cancelled);
    assert!(session.is_finished());
}
