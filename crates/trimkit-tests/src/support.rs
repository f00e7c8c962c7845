//! Shared helpers for the integration tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use trimkit_core::{Orientation, RationalTime, Result, TimeRange, TrimError};
use trimkit_editor::testing::{RecordingPlayer, ScriptedTranscoder};
use trimkit_editor::{EditSession, EditorConfig, SessionReceiver};
use trimkit_media::{SourceAsset, TrackInfo, TrackKind, Transcoder};
use uuid::Uuid;

pub fn secs(s: i64) -> RationalTime {
    RationalTime::from_secs(s)
}

pub fn millis(ms: i64) -> RationalTime {
    RationalTime::from_millis(ms)
}

pub fn range(start: RationalTime, end: RationalTime) -> TimeRange {
    TimeRange::from_start_end(start, end)
}

/// Config with a 1 s minimum, 5 s maximum and fast progress polling.
pub fn config(output_dir: &Path) -> EditorConfig {
    EditorConfig {
        minimum_duration: secs(1),
        maximum_duration: secs(5),
        progress_interval: Duration::from_millis(5),
        output_dir: Some(output_dir.to_path_buf()),
        ..EditorConfig::default()
    }
}

pub async fn open(
    config: EditorConfig,
    source: Arc<dyn SourceAsset>,
    transcoder: Arc<dyn Transcoder>,
) -> (EditSession<RecordingPlayer>, SessionReceiver) {
    EditSession::open(config, source, RecordingPlayer::new(), transcoder)
        .await
        .expect("session opens")
}

pub fn scripted() -> (Arc<dyn Transcoder>, tokio::sync::mpsc::UnboundedReceiver<trimkit_editor::testing::ScriptedJob>) {
    let (transcoder, jobs) = ScriptedTranscoder::new();
    (Arc::new(transcoder), jobs)
}

/// Write a file of `len` bytes standing in for a source video.
pub fn fake_media_file(dir: &Path, len: usize) -> PathBuf {
    let path = dir.join("source.mov");
    let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, bytes).expect("write source");
    path
}

/// Asset whose track listing starts failing after `good_loads` calls.
#[derive(Debug)]
pub struct FlakyAsset {
    id: Uuid,
    duration: RationalTime,
    good_loads: usize,
    loads: AtomicUsize,
}

impl FlakyAsset {
    pub fn new(duration: RationalTime, good_loads: usize) -> Arc<dyn SourceAsset> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            duration,
            good_loads,
            loads: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SourceAsset for FlakyAsset {
    fn id(&self) -> Uuid {
        self.id
    }

    fn path(&self) -> &Path {
        Path::new("flaky.mp4")
    }

    async fn full_duration(&self) -> Result<RationalTime> {
        Ok(self.duration)
    }

    async fn tracks(&self) -> Result<Vec<TrackInfo>> {
        if self.loads.fetch_add(1, Ordering::SeqCst) >= self.good_loads {
            return Err(TrimError::AssetLoadFailed("media went away".into()));
        }
        Ok(vec![TrackInfo {
            index: 0,
            kind: TrackKind::Video,
            codec: "h264".into(),
            time_range: TimeRange::full(self.duration),
            orientation: Orientation::IDENTITY,
        }])
    }
}

/// Asset whose n-th duration load waits until [`SteppedAsset::release`]`(n)`.
#[derive(Debug)]
pub struct SteppedAsset {
    id: Uuid,
    duration: RationalTime,
    steps: Vec<Semaphore>,
    loads: AtomicUsize,
}

impl SteppedAsset {
    pub fn new(duration: RationalTime, steps: usize) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            duration,
            steps: (0..steps).map(|_| Semaphore::new(0)).collect(),
            loads: AtomicUsize::new(0),
        })
    }

    pub fn release(&self, step: usize) {
        self.steps[step].add_permits(1);
    }

    /// Yield until `n` loads have started.
    pub async fn wait_for_loads(&self, n: usize) {
        while self.loads.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl SourceAsset for SteppedAsset {
    fn id(&self) -> Uuid {
        self.id
    }

    fn path(&self) -> &Path {
        Path::new("stepped.mp4")
    }

    async fn full_duration(&self) -> Result<RationalTime> {
        let step = self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = self.steps.get(step) {
            let _ = gate.acquire().await.map(|permit| permit.forget());
        }
        Ok(self.duration)
    }

    async fn tracks(&self) -> Result<Vec<TrackInfo>> {
        Ok(vec![TrackInfo {
            index: 0,
            kind: TrackKind::Video,
            codec: "h264".into(),
            time_range: TimeRange::full(self.duration),
            orientation: Orientation::IDENTITY,
        }])
    }
}
