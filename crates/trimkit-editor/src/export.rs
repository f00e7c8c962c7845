//! Cancellable export of the selected range, as a lazy stream of outcomes.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use trimkit_core::{Result, TimeRange, TrimError};
use trimkit_media::{
    ExportCancel, Playable, PresetId, SourceAsset, TranscodeJob, TranscodeProfile,
    TranscodeRequest, Transcoder,
};

/// Default progress polling cadence.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// How long an aborted backend gets to wind down before the export reports
/// `Cancelled` without it.
pub const DEFAULT_ABORT_GRACE: Duration = Duration::from_secs(2);

/// One export attempt. Never reused: each attempt gets a fresh output path.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub source: Arc<dyn SourceAsset>,
    /// Range of the source to write.
    pub range: TimeRange,
    /// `None` keeps the source streams as they are.
    pub preset: Option<PresetId>,
    pub output_path: PathBuf,
}

impl ExportRequest {
    /// Export exactly what a playable covers.
    pub fn for_playable(playable: &Playable, preset: Option<PresetId>, output_path: PathBuf) -> Self {
        Self {
            source: Arc::clone(playable.source()),
            range: playable.source_range(),
            preset,
            output_path,
        }
    }
}

/// Event of an export stream. The last event is always terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Progress(f32),
    Succeeded(PathBuf),
    Failed(TrimError),
    Cancelled,
}

impl ExportOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// Starts exports against a transcode backend.
#[derive(Debug, Clone)]
pub struct ExportPipeline {
    transcoder: Arc<dyn Transcoder>,
    progress_interval: Duration,
    abort_grace: Duration,
}

impl ExportPipeline {
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            transcoder,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            abort_grace: DEFAULT_ABORT_GRACE,
        }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_abort_grace(mut self, grace: Duration) -> Self {
        self.abort_grace = grace;
        self
    }

    /// Prepare an export. Nothing runs until the stream is first polled.
    pub fn start(&self, request: ExportRequest) -> ExportStream {
        self.start_with_cancel(request, ExportCancel::new())
    }

    /// Like [`start`](Self::start), cancelled through `cancel`.
    pub fn start_with_cancel(&self, request: ExportRequest, cancel: ExportCancel) -> ExportStream {
        ExportStream {
            pending: Some(Driver {
                transcoder: Arc::clone(&self.transcoder),
                request,
                interval: self.progress_interval,
                abort_grace: self.abort_grace,
                cancel: cancel.clone(),
            }),
            rx: None,
            cancel,
            finished: false,
        }
    }
}

/// Lazy, finite sequence of [`ExportOutcome`]s.
///
/// Dropping the stream cancels the export.
#[derive(Debug)]
pub struct ExportStream {
    pending: Option<Driver>,
    rx: Option<mpsc::UnboundedReceiver<ExportOutcome>>,
    cancel: ExportCancel,
    finished: bool,
}

impl ExportStream {
    /// Next event; `None` after the terminal one.
    pub async fn next(&mut self) -> Option<ExportOutcome> {
        if self.finished {
            return None;
        }
        if let Some(driver) = self.pending.take() {
            let (tx, rx) = mpsc::unbounded_channel();
            self.rx = Some(rx);
            tokio::spawn(driver.run(tx));
        }
        let received = match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        };
        // The driver always sends a terminal event before exiting.
        let outcome = received.unwrap_or_else(|| {
            ExportOutcome::Failed(TrimError::ExportFailed("export task ended".into()))
        });
        if outcome.is_terminal() {
            self.finished = true;
        }
        Some(outcome)
    }

    /// Drive to the terminal event, reporting progress along the way.
    pub async fn finish(mut self, mut on_progress: impl FnMut(f32)) -> ExportOutcome {
        while let Some(outcome) = self.next().await {
            match outcome {
                ExportOutcome::Progress(fraction) => on_progress(fraction),
                terminal => return terminal,
            }
        }
        ExportOutcome::Failed(TrimError::ExportFailed("export already finished".into()))
    }

    /// Withdraw the request.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> ExportCancel {
        self.cancel.clone()
    }
}

impl Drop for ExportStream {
    fn drop(&mut self) {
        if !self.finished {
            self.cancel.cancel();
        }
    }
}

/// Make sure `path` can be written: parent exists, no stale file.
fn prepare_output(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            TrimError::ExportFailed(format!("Cannot create {}: {e}", parent.display()))
        })?;
    }
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed stale output");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TrimError::ExportFailed(format!(
            "Cannot clear {}: {e}",
            path.display()
        ))),
    }
}

#[derive(Debug)]
struct Driver {
    transcoder: Arc<dyn Transcoder>,
    request: ExportRequest,
    interval: Duration,
    abort_grace: Duration,
    cancel: ExportCancel,
}

/// Tell the backend to stop and give it `grace` to acknowledge.
async fn abort_job(abort: &ExportCancel, done: &mut oneshot::Receiver<Result<()>>, grace: Duration) {
    abort.cancel();
    if tokio::time::timeout(grace, done).await.is_err() {
        warn!(?grace, "Transcoder did not stop in time, abandoning it");
    }
}

impl Driver {
    async fn run(self, tx: mpsc::UnboundedSender<ExportOutcome>) {
        let output_path = self.request.output_path.clone();
        let outcome = self.drive(&tx).await;
        match &outcome {
            ExportOutcome::Succeeded(path) => info!(path = %path.display(), "Export finished"),
            ExportOutcome::Cancelled => info!(path = %output_path.display(), "Export cancelled"),
            ExportOutcome::Failed(e) => warn!(error = %e, "Export failed"),
            ExportOutcome::Progress(_) => {}
        }
        let _ = tx.send(outcome);
    }

    async fn drive(self, tx: &mpsc::UnboundedSender<ExportOutcome>) -> ExportOutcome {
        let Driver {
            transcoder,
            request,
            interval,
            abort_grace,
            cancel,
        } = self;

        if cancel.is_cancelled() {
            return ExportOutcome::Cancelled;
        }
        if let Err(e) = prepare_output(&request.output_path) {
            return ExportOutcome::Failed(e);
        }

        let profile = TranscodeProfile::resolve(request.preset);
        info!(
            output = %request.output_path.display(),
            range = %request.range,
            preset = request.preset.map_or("passthrough", PresetId::name),
            "Export started"
        );
        let transcode = TranscodeRequest {
            source_path: request.source.path().to_path_buf(),
            range: request.range,
            profile,
            output_path: request.output_path.clone(),
        };

        let started = tokio::select! {
            job = transcoder.start(transcode) => job,
            _ = cancel.cancelled() => return ExportOutcome::Cancelled,
        };
        let TranscodeJob {
            progress,
            abort,
            mut done,
        } = match started {
            Ok(job) => job,
            Err(e) => return ExportOutcome::Failed(e),
        };

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut reported = 0.0_f32;

        // Polling lives inside this loop, so it stops with the export.
        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    abort_job(&abort, &mut done, abort_grace).await;
                    return ExportOutcome::Cancelled;
                }
                finished = &mut done => {
                    break finished.unwrap_or_else(|_| {
                        Err(TrimError::ExportFailed("transcoder stopped without a result".into()))
                    });
                }
                _ = ticker.tick() => {
                    let fraction = progress.get().max(reported);
                    if fraction > reported || reported == 0.0 {
                        debug!(fraction, "Export progress");
                    }
                    reported = fraction;
                    if tx.send(ExportOutcome::Progress(fraction)).is_err() {
                        abort_job(&abort, &mut done, abort_grace).await;
                        return ExportOutcome::Cancelled;
                    }
                }
            }
        };

        // A cancel that raced with completion still wins.
        if cancel.is_cancelled() {
            return ExportOutcome::Cancelled;
        }
        match result {
            Ok(()) => {
                if reported < 1.0 {
                    let _ = tx.send(ExportOutcome::Progress(1.0));
                }
                ExportOutcome::Succeeded(request.output_path)
            }
            Err(TrimError::Cancelled) => ExportOutcome::Cancelled,
            Err(e) => ExportOutcome::Failed(e),
        }
    }
}
