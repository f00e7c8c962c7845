//! Keeps the player, the trim control and the composed asset in step.

use crate::mapping::{to_display_position, to_player_seek_target};
use crate::player::{Player, SeekTolerance};
use crate::recompose::{Recomposed, Recomposer};
use crate::trim::{Gesture, TrimStateMachine};
use tracing::{debug, info, warn};
use trimkit_core::{RationalTime, TimeRange, TrimError};
use trimkit_media::Playable;

/// What happened when a recomposition result was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// The player now shows the new asset.
    Swapped { generation: u64 },
    /// The player already held this asset.
    Unchanged { generation: u64 },
    /// Recomposition failed; the player keeps its previous asset.
    Failed { generation: u64, error: TrimError },
}

/// Owns the player and is the only writer of its content.
///
/// All methods run on the owning context; recomposition work runs on the
/// runtime and comes back through [`pump`](Self::pump) or
/// [`next_recomposition`](Self::next_recomposition).
#[derive(Debug)]
pub struct PlaybackCoordinator<P: Player> {
    player: P,
    trim: TrimStateMachine,
    recomposer: Recomposer,
    /// Captured at gesture begin, consumed at gesture end.
    was_playing: Option<bool>,
}

impl<P: Player> PlaybackCoordinator<P> {
    pub fn new(player: P, trim: TrimStateMachine, recomposer: Recomposer) -> Self {
        Self {
            player,
            trim,
            recomposer,
            was_playing: None,
        }
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    pub fn trim(&self) -> &TrimStateMachine {
        &self.trim
    }

    pub fn recomposer(&self) -> &Recomposer {
        &self.recomposer
    }

    /// Asset currently loaded in the player.
    pub fn displayed(&self) -> Option<&Playable> {
        self.player.current_item()
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }

    /// Play/pause button.
    pub fn toggle_playback(&mut self) -> bool {
        if self.player.is_playing() {
            self.player.pause();
        } else {
            self.player.play();
        }
        self.player.is_playing()
    }

    /// Request the asset the current mode calls for: the selection when
    /// idle, the full asset during a gesture.
    pub fn on_trim_mode_changed(&mut self) -> u64 {
        let range = self.trim.playback_range();
        self.recomposer.submit(range)
    }

    /// Commit a new selection and rebuild the player content for it.
    pub fn on_range_committed(&mut self, range: TimeRange) -> u64 {
        if self.trim.mode().is_idle() {
            self.trim.set_selected_range(range);
        } else {
            self.trim.update_range(range);
        }
        self.on_trim_mode_changed()
    }

    /// Start a gesture: pause, remembering whether we were playing, and
    /// switch the player to the full asset.
    pub fn begin_gesture(&mut self, gesture: Gesture) -> bool {
        if !self.trim.begin(gesture) {
            return false;
        }
        self.was_playing = Some(self.player.is_playing());
        self.player.pause();
        self.on_trim_mode_changed();
        true
    }

    /// End a gesture: resume only if playing when it began, and switch the
    /// player back to the selection.
    pub fn end_gesture(&mut self, gesture: Gesture) -> bool {
        if !self.trim.end(gesture) {
            return false;
        }
        if self.was_playing.take() == Some(true) {
            self.player.play();
        }
        self.on_trim_mode_changed();
        true
    }

    /// Drag update from the trim control.
    pub fn update_range(&mut self, candidate: TimeRange) -> Option<TimeRange> {
        self.trim.update_range(candidate)
    }

    /// Periodic player callback: publish the player position to the trim
    /// control in full-asset time.
    pub fn on_periodic_tick(&mut self, player_position: RationalTime) -> RationalTime {
        let display = to_display_position(player_position, self.trim.state());
        self.trim.set_progress(display)
    }

    /// Playhead dragged on the trim control: seek the player exactly there.
    pub fn on_scrub_position_changed(&mut self, display_position: RationalTime) {
        let display = self.trim.set_progress(display_position);
        let target = to_player_seek_target(display, self.trim.state());
        self.player.seek(target, SeekTolerance::Exact);
    }

    /// Read the player clock and publish it.
    pub fn tick(&mut self) -> RationalTime {
        let position = self.player.current_time();
        self.on_periodic_tick(position)
    }

    /// Apply a current recomposition result.
    pub fn apply(&mut self, recomposed: Recomposed) -> Applied {
        let Recomposed {
            generation, result, ..
        } = recomposed;
        match result {
            Ok(playable) => {
                let unchanged = self
                    .player
                    .current_item()
                    .is_some_and(|current| current.same_as(&playable));
                if unchanged {
                    debug!(generation, "Player already holds this asset");
                    return Applied::Unchanged { generation };
                }
                info!(
                    generation,
                    range = %playable.source_range(),
                    "Recomposition applied"
                );
                self.player.replace_current_item(playable);
                Applied::Swapped { generation }
            }
            Err(error) => {
                warn!(generation, error = %error, "Recomposition failed");
                Applied::Failed { generation, error }
            }
        }
    }

    /// Apply a result that has already arrived, without waiting.
    pub fn pump(&mut self) -> Option<Applied> {
        let recomposed = self.recomposer.try_next()?;
        Some(self.apply(recomposed))
    }

    /// Wait for the latest outstanding recomposition and apply it.
    pub async fn next_recomposition(&mut self) -> Option<Applied> {
        let recomposed = self.recomposer.next().await?;
        Some(self.apply(recomposed))
    }
}
