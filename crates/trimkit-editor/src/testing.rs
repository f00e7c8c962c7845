//! In-memory fakes for the asset, player and transcoder seams.

use crate::player::{Player, SeekTolerance};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use trimkit_core::{Orientation, RationalTime, Result, TimeRange, TrimError};
use trimkit_media::{
    ExportCancel, Playable, SourceAsset, TrackInfo, TrackKind, TranscodeJob, TranscodeProgress,
    TranscodeRequest, Transcoder,
};
use uuid::Uuid;

/// Holds metadata loads until opened.
#[derive(Debug, Clone)]
pub struct Gate(Arc<watch::Sender<bool>>);

impl Gate {
    fn new(open: bool) -> Self {
        let (tx, _rx) = watch::channel(open);
        Self(Arc::new(tx))
    }

    pub fn open(&self) {
        self.0.send_replace(true);
    }

    async fn passed(&self) {
        let mut rx = self.0.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

/// A portrait video with one video and one audio track whose metadata
/// loads wait on a [`Gate`].
#[derive(Debug)]
pub struct GatedAsset {
    id: Uuid,
    path: PathBuf,
    duration: RationalTime,
    gate: Gate,
    fail: bool,
    loads: AtomicUsize,
}

impl GatedAsset {
    /// Closed gate.
    pub fn new(duration: RationalTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: PathBuf::from("gated.mp4"),
            duration,
            gate: Gate::new(false),
            fail: false,
            loads: AtomicUsize::new(0),
        }
    }

    /// Loads immediately.
    pub fn ready(duration: RationalTime) -> Arc<dyn SourceAsset> {
        let asset = Self::new(duration);
        asset.gate.open();
        Arc::new(asset)
    }

    /// Like [`ready`](Self::ready) but backed by a real file path.
    pub fn at_path(path: impl Into<PathBuf>, duration: RationalTime) -> Arc<dyn SourceAsset> {
        let mut asset = Self::new(duration);
        asset.path = path.into();
        asset.gate.open();
        Arc::new(asset)
    }

    /// Every load fails.
    pub fn failing() -> Arc<dyn SourceAsset> {
        let mut asset = Self::new(RationalTime::ZERO);
        asset.fail = true;
        asset.gate.open();
        Arc::new(asset)
    }

    pub fn gate(&self) -> Gate {
        self.gate.clone()
    }

    /// Number of duration loads so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SourceAsset for GatedAsset {
    fn id(&self) -> Uuid {
        self.id
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn full_duration(&self) -> Result<RationalTime> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.gate.passed().await;
        if self.fail {
            return Err(TrimError::AssetLoadFailed("unreadable".to_string()));
        }
        Ok(self.duration)
    }

    async fn tracks(&self) -> Result<Vec<TrackInfo>> {
        if self.fail {
            return Err(TrimError::AssetLoadFailed("unreadable".to_string()));
        }
        let track = |index, kind, orientation| TrackInfo {
            index,
            kind,
            codec: String::new(),
            time_range: TimeRange::full(self.duration),
            orientation,
        };
        Ok(vec![
            track(0, TrackKind::Video, Orientation::from_rotation_degrees(90.0)),
            track(1, TrackKind::Audio, Orientation::IDENTITY),
        ])
    }
}

/// Player fake that records what the coordinator asks of it.
#[derive(Debug, Default)]
pub struct RecordingPlayer {
    pub playing: bool,
    pub time: RationalTime,
    pub item: Option<Playable>,
    pub replacements: usize,
    pub seeks: Vec<(RationalTime, SeekTolerance)>,
    pub play_calls: usize,
    pub pause_calls: usize,
}

impl RecordingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playing() -> Self {
        Self {
            playing: true,
            ..Self::default()
        }
    }
}

impl Player for RecordingPlayer {
    fn is_playing(&self) -> bool {
        self.playing
    }

    fn play(&mut self) {
        self.play_calls += 1;
        self.playing = true;
    }

    fn pause(&mut self) {
        self.pause_calls += 1;
        self.playing = false;
    }

    fn current_time(&self) -> RationalTime {
        self.time
    }

    fn current_item(&self) -> Option<&Playable> {
        self.item.as_ref()
    }

    fn replace_current_item(&mut self, item: Playable) {
        self.replacements += 1;
        self.item = Some(item);
        self.time = RationalTime::ZERO;
    }

    fn seek(&mut self, to: RationalTime, tolerance: SeekTolerance) {
        self.seeks.push((to, tolerance));
        self.time = to;
    }
}

/// A transcode the test finishes by hand.
#[derive(Debug)]
pub struct ScriptedJob {
    pub request: TranscodeRequest,
    pub progress: TranscodeProgress,
    pub abort: ExportCancel,
    finish: oneshot::Sender<Result<()>>,
}

impl ScriptedJob {
    /// Write `bytes` to the output path and report success.
    pub fn succeed(self, bytes: &[u8]) {
        let result = std::fs::write(&self.request.output_path, bytes)
            .map_err(|e| TrimError::ExportFailed(e.to_string()));
        self.progress.set(1.0);
        let _ = self.finish.send(result);
    }

    pub fn fail(self, error: TrimError) {
        let _ = self.finish.send(Err(error));
    }

    /// Finish as the backend would after noticing an abort.
    pub fn aborted(self) {
        let _ = self.finish.send(Err(TrimError::Cancelled));
    }
}

/// Transcoder handing each started job to the test.
#[derive(Debug, Clone)]
pub struct ScriptedTranscoder {
    jobs: mpsc::UnboundedSender<ScriptedJob>,
}

impl ScriptedTranscoder {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScriptedJob>) {
        let (jobs, rx) = mpsc::unbounded_channel();
        (Self { jobs }, rx)
    }
}

#[async_trait]
impl Transcoder for ScriptedTranscoder {
    async fn start(&self, request: TranscodeRequest) -> Result<TranscodeJob> {
        let progress = TranscodeProgress::new();
        let abort = ExportCancel::new();
        let (finish, done) = oneshot::channel();
        self.jobs
            .send(ScriptedJob {
                request,
                progress: progress.clone(),
                abort: abort.clone(),
                finish,
            })
            .map_err(|_| TrimError::ExportFailed("no test harness attached".to_string()))?;
        Ok(TranscodeJob {
            progress,
            abort,
            done,
        })
    }
}

/// Transcoder that copies the source file in a few timed steps.
#[derive(Debug, Clone)]
pub struct CopyingTranscoder {
    pub steps: u32,
    pub step_delay: Duration,
}

impl Default for CopyingTranscoder {
    fn default() -> Self {
        Self {
            steps: 4,
            step_delay: Duration::from_millis(20),
        }
    }
}

#[async_trait]
impl Transcoder for CopyingTranscoder {
    async fn start(&self, request: TranscodeRequest) -> Result<TranscodeJob> {
        let progress = TranscodeProgress::new();
        let abort = ExportCancel::new();
        let (finish, done) = oneshot::channel();
        let (job_progress, job_abort, steps, delay) =
            (progress.clone(), abort.clone(), self.steps.max(1), self.step_delay);

        tokio::spawn(async move {
            for step in 1..=steps {
                tokio::select! {
                    _ = job_abort.cancelled() => {
                        let _ = finish.send(Err(TrimError::Cancelled));
                        return;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                job_progress.set(step as f32 / steps as f32);
            }
            let result = std::fs::copy(&request.source_path, &request.output_path)
                .map(|_| ())
                .map_err(|e| TrimError::ExportFailed(e.to_string()));
            let _ = finish.send(result);
        });

        Ok(TranscodeJob {
            progress,
            abort,
            done,
        })
    }
}
