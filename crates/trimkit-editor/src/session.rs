//! An editing session: one source, one player, one outcome.

use crate::config::EditorConfig;
use crate::export::{ExportOutcome, ExportPipeline, ExportRequest};
use crate::playback::{Applied, PlaybackCoordinator};
use crate::player::Player;
use crate::recompose::Recomposer;
use crate::trim::{Gesture, TrimStateMachine};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};
use trimkit_core::{RationalTime, Result, TimeRange, TrimError};
use trimkit_media::{compose, ExportCancel, Playable, SourceAsset, Transcoder};
use uuid::Uuid;

/// How a session ended. Delivered exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Saved { path: PathBuf, range: TimeRange },
    Failed(TrimError),
    Cancelled,
}

/// Receives the session outcome.
pub type SessionReceiver = oneshot::Receiver<SessionOutcome>;

/// Single-use slot for the outcome. The first delivery wins.
#[derive(Debug, Clone)]
struct OutcomeSlot(Arc<Mutex<Option<oneshot::Sender<SessionOutcome>>>>);

impl OutcomeSlot {
    fn new() -> (Self, SessionReceiver) {
        let (tx, rx) = oneshot::channel();
        (Self(Arc::new(Mutex::new(Some(tx)))), rx)
    }

    fn deliver(&self, outcome: SessionOutcome) -> bool {
        let Some(tx) = self.0.lock().take() else {
            return false;
        };
        info!(?outcome, "Session finished");
        // The host may have stopped listening; the outcome is still final.
        let _ = tx.send(outcome);
        true
    }

    fn is_delivered(&self) -> bool {
        self.0.lock().is_none()
    }
}

/// Clonable handle that ends a session as cancelled from any task.
#[derive(Debug, Clone)]
pub struct SessionCancel {
    export: ExportCancel,
    outcome: OutcomeSlot,
}

impl SessionCancel {
    pub fn cancel(&self) {
        self.export.cancel();
        self.outcome.deliver(SessionOutcome::Cancelled);
    }
}

/// Trim, preview and export of one source asset.
#[derive(Debug)]
pub struct EditSession<P: Player> {
    config: EditorConfig,
    coordinator: PlaybackCoordinator<P>,
    pipeline: ExportPipeline,
    cancel: ExportCancel,
    outcome: OutcomeSlot,
}

impl<P: Player> EditSession<P> {
    /// Load the source, seed the selection and request the first preview.
    pub async fn open(
        config: EditorConfig,
        source: Arc<dyn SourceAsset>,
        player: P,
        transcoder: Arc<dyn Transcoder>,
    ) -> Result<(Self, SessionReceiver)> {
        config.validate()?;
        let full_range = source.full_range().await?;
        info!(path = %source.path().display(), duration = %full_range.duration, "Session opened");

        let mut trim = TrimStateMachine::new(full_range, config.minimum_duration, config.maximum_duration);
        if let Some(initial) = config.initial_selected_range {
            trim.set_selected_range(initial);
        }

        let mut coordinator = PlaybackCoordinator::new(player, trim, Recomposer::new(source));
        coordinator.on_trim_mode_changed();

        let pipeline = ExportPipeline::new(transcoder).with_progress_interval(config.progress_interval);
        let (outcome, rx) = OutcomeSlot::new();
        Ok((
            Self {
                config,
                coordinator,
                pipeline,
                cancel: ExportCancel::new(),
                outcome,
            },
            rx,
        ))
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &PlaybackCoordinator<P> {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut PlaybackCoordinator<P> {
        &mut self.coordinator
    }

    pub fn selected_range(&self) -> TimeRange {
        self.coordinator.trim().selected_range()
    }

    /// Playhead position shown on the trim control.
    pub fn position(&self) -> RationalTime {
        self.coordinator.trim().position()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_delivered()
    }

    pub fn begin_gesture(&mut self, gesture: Gesture) -> bool {
        self.coordinator.begin_gesture(gesture)
    }

    pub fn end_gesture(&mut self, gesture: Gesture) -> bool {
        self.coordinator.end_gesture(gesture)
    }

    pub fn update_range(&mut self, candidate: TimeRange) -> Option<TimeRange> {
        self.coordinator.update_range(candidate)
    }

    pub fn scrub_to(&mut self, display_position: RationalTime) {
        self.coordinator.on_scrub_position_changed(display_position);
    }

    pub fn toggle_playback(&mut self) -> bool {
        self.coordinator.toggle_playback()
    }

    fn observe(&self, applied: &Applied) {
        if let Applied::Failed { error, .. } = applied {
            self.outcome.deliver(SessionOutcome::Failed(error.clone()));
        }
    }

    /// One host tick: apply any arrived preview, then publish the playhead.
    pub fn tick(&mut self) -> RationalTime {
        if let Some(applied) = self.coordinator.pump() {
            self.observe(&applied);
        }
        self.coordinator.tick()
    }

    /// Wait for the outstanding preview and apply it.
    pub async fn next_recomposition(&mut self) -> Option<Applied> {
        let applied = self.coordinator.next_recomposition().await?;
        self.observe(&applied);
        Some(applied)
    }

    /// Handle that cancels the export from another task.
    pub fn export_cancel(&self) -> SessionCancel {
        SessionCancel {
            export: self.cancel.clone(),
            outcome: self.outcome.clone(),
        }
    }

    /// Cancel the session, including any running export.
    pub fn cancel(&self) {
        self.export_cancel().cancel();
    }

    /// Export the selection and deliver the session outcome.
    pub async fn save(&mut self, on_progress: impl FnMut(f32)) -> Result<SessionOutcome> {
        if self.outcome.is_delivered() {
            return Err(TrimError::InvalidParameter("session already finished".into()));
        }
        let selected = self.coordinator.trim().selected_range();

        let playable = match self.export_source(selected).await {
            Ok(playable) => playable,
            Err(e) => {
                warn!(error = %e, "Cannot prepare export");
                let outcome = SessionOutcome::Failed(e);
                self.outcome.deliver(outcome.clone());
                return Ok(outcome);
            }
        };

        let output_path = self
            .config
            .output_directory()
            .join(format!("{}.mp4", Uuid::new_v4()));
        let request = ExportRequest::for_playable(&playable, self.config.preset, output_path);
        let stream = self.pipeline.start_with_cancel(request, self.cancel.clone());

        let outcome = match stream.finish(on_progress).await {
            ExportOutcome::Succeeded(path) => SessionOutcome::Saved {
                path,
                range: selected,
            },
            ExportOutcome::Failed(e) => SessionOutcome::Failed(e),
            ExportOutcome::Cancelled | ExportOutcome::Progress(_) => SessionOutcome::Cancelled,
        };
        // A cancel delivered during the export takes precedence.
        self.outcome.deliver(outcome.clone());
        Ok(outcome)
    }

    /// Asset to export: the displayed one when it covers exactly the
    /// selection, otherwise a fresh composition.
    async fn export_source(&self, selected: TimeRange) -> Result<Playable> {
        if let Some(displayed) = self.coordinator.displayed() {
            if displayed.source_range() == selected {
                return Ok(displayed.clone());
            }
        }
        compose(Arc::clone(self.coordinator.recomposer().source()), selected).await
    }
}
