//! Trim handle state: selection range, gesture mode and playhead position.

use serde::{Deserialize, Serialize};
use tracing::debug;
use trimkit_core::{RationalTime, TimeRange};

/// What the user is currently doing with the trim control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrimMode {
    #[default]
    Idle,
    AdjustingStart,
    AdjustingEnd,
    Scrubbing,
}

impl TrimMode {
    #[inline]
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }
}

/// A gesture on the trim control. Each has a begin and an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    /// Dragging the start handle.
    AdjustStart,
    /// Dragging the end handle.
    AdjustEnd,
    /// Dragging the playhead.
    Scrub,
}

impl Gesture {
    /// Mode entered while this gesture is active.
    pub fn mode(self) -> TrimMode {
        match self {
            Self::AdjustStart => TrimMode::AdjustingStart,
            Self::AdjustEnd => TrimMode::AdjustingEnd,
            Self::Scrub => TrimMode::Scrubbing,
        }
    }
}

/// Which edge stays put while a candidate range is clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Start,
    End,
}

/// Snapshot of the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionState {
    pub full_range: TimeRange,
    pub selected_range: TimeRange,
    pub minimum_duration: RationalTime,
    pub maximum_duration: RationalTime,
    pub mode: TrimMode,
}

impl SelectionState {
    /// Duration bounds actually reachable inside `full_range`.
    ///
    /// A source shorter than the minimum can only be selected whole.
    fn effective_bounds(&self) -> (RationalTime, RationalTime) {
        let full = self.full_range.duration.max(RationalTime::ZERO);
        let min = self.minimum_duration.clamp(RationalTime::ZERO, full);
        let max = self.maximum_duration.min(full).max(min);
        (min, max)
    }

    /// Clamp `candidate` into the full range and the duration bounds,
    /// keeping the `anchor` edge where it is and moving the other edge only
    /// as far as the bounds allow.
    ///
    /// A start handle dragged closer to the end than the minimum reopens the
    /// selection to the longest range that fits against the end edge.
    fn clamp(&self, candidate: TimeRange, anchor: Anchor) -> TimeRange {
        let full = self.full_range;
        let (min, max) = self.effective_bounds();

        match anchor {
            Anchor::End => {
                let end = candidate.end().clamp(full.start + min, full.end());
                let earliest = (end - max).max(full.start);
                let latest = end - min;
                let start = if candidate.start > latest {
                    earliest
                } else {
                    candidate.start.max(earliest)
                };
                TimeRange::from_start_end(start, end)
            }
            Anchor::Start => {
                let start = candidate.start.clamp(full.start, full.end() - min);
                let earliest = start + min;
                let latest = (start + max).min(full.end());
                let end = candidate.end().clamp(earliest, latest);
                TimeRange::from_start_end(start, end)
            }
        }
    }
}

/// Owns the selection and enforces its duration constraints.
///
/// Every input is clamped rather than rejected; transitions that do not
/// apply in the current mode are ignored and reported by returning `false`.
#[derive(Debug, Clone)]
pub struct TrimStateMachine {
    state: SelectionState,
    /// Playhead position in full-asset time.
    position: RationalTime,
}

impl TrimStateMachine {
    /// Start idle with `[full.start, full.start + min(full, maximum)]` selected.
    pub fn new(full_range: TimeRange, minimum_duration: RationalTime, maximum_duration: RationalTime) -> Self {
        let mut machine = Self {
            state: SelectionState {
                full_range,
                selected_range: full_range,
                minimum_duration,
                maximum_duration,
                mode: TrimMode::Idle,
            },
            position: full_range.start,
        };
        let initial = TimeRange::new(full_range.start, maximum_duration);
        machine.state.selected_range = machine.state.clamp(initial, Anchor::Start);
        machine
    }

    /// Replace the selection outright (e.g. restoring a previous edit).
    pub fn set_selected_range(&mut self, range: TimeRange) -> TimeRange {
        self.state.selected_range = self.state.clamp(range, Anchor::Start);
        self.state.selected_range
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    #[inline]
    pub fn mode(&self) -> TrimMode {
        self.state.mode
    }

    #[inline]
    pub fn selected_range(&self) -> TimeRange {
        self.state.selected_range
    }

    #[inline]
    pub fn full_range(&self) -> TimeRange {
        self.state.full_range
    }

    /// Range the player should hold: the selection when idle, the whole
    /// asset while a gesture is in progress.
    pub fn playback_range(&self) -> TimeRange {
        if self.state.mode.is_idle() {
            self.state.selected_range
        } else {
            self.state.full_range
        }
    }

    /// Enter a gesture mode. Only valid from `Idle`.
    pub fn begin(&mut self, gesture: Gesture) -> bool {
        if !self.state.mode.is_idle() {
            debug!(?gesture, mode = ?self.state.mode, "Ignoring gesture begin");
            return false;
        }
        self.state.mode = gesture.mode();
        true
    }

    /// Leave a gesture mode, committing the clamped range.
    pub fn end(&mut self, gesture: Gesture) -> bool {
        if self.state.mode != gesture.mode() {
            debug!(?gesture, mode = ?self.state.mode, "Ignoring gesture end");
            return false;
        }
        let anchor = Self::anchor_for(self.state.mode);
        self.state.selected_range = self.state.clamp(self.state.selected_range, anchor);
        self.state.mode = TrimMode::Idle;
        true
    }

    pub fn begin_adjust_start(&mut self) -> bool {
        self.begin(Gesture::AdjustStart)
    }

    pub fn end_adjust_start(&mut self) -> bool {
        self.end(Gesture::AdjustStart)
    }

    pub fn begin_adjust_end(&mut self) -> bool {
        self.begin(Gesture::AdjustEnd)
    }

    pub fn end_adjust_end(&mut self) -> bool {
        self.end(Gesture::AdjustEnd)
    }

    pub fn begin_scrub(&mut self) -> bool {
        self.begin(Gesture::Scrub)
    }

    pub fn end_scrub(&mut self) -> bool {
        self.end(Gesture::Scrub)
    }

    fn anchor_for(mode: TrimMode) -> Anchor {
        match mode {
            TrimMode::AdjustingStart => Anchor::End,
            _ => Anchor::Start,
        }
    }

    /// Move the selection while adjusting or scrubbing.
    ///
    /// Dragging the start handle keeps the end edge fixed, anything else
    /// keeps the start edge fixed. Returns `None` when idle.
    pub fn update_range(&mut self, candidate: TimeRange) -> Option<TimeRange> {
        if self.state.mode.is_idle() {
            debug!(range = %candidate, "Ignoring range update while idle");
            return None;
        }
        let anchor = Self::anchor_for(self.state.mode);
        self.state.selected_range = self.state.clamp(candidate, anchor);
        Some(self.state.selected_range)
    }

    /// Playhead position in full-asset time.
    #[inline]
    pub fn position(&self) -> RationalTime {
        self.position
    }

    /// Write the playhead position, clamped into the full range.
    pub fn set_progress(&mut self, position: RationalTime) -> RationalTime {
        self.position = self.state.full_range.clamp_time(position);
        self.position
    }
}
