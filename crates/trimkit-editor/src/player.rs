//! The player seam and a clock-driven headless player.

use std::time::Instant;
use trimkit_core::RationalTime;
use trimkit_media::Playable;

/// How far a seek may land from the requested time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekTolerance {
    /// Land exactly on the requested time.
    #[default]
    Exact,
    /// Any nearby keyframe is acceptable.
    Keyframe,
}

/// A media player that the coordinator drives.
///
/// Times are in the local time of the current item.
pub trait Player: Send {
    fn is_playing(&self) -> bool;
    fn play(&mut self);
    fn pause(&mut self);
    fn current_time(&self) -> RationalTime;
    fn current_item(&self) -> Option<&Playable>;
    /// Load a new item, starting at its local zero.
    fn replace_current_item(&mut self, item: Playable);
    fn seek(&mut self, to: RationalTime, tolerance: SeekTolerance);
}

/// Player without output, advancing with the wall clock while playing.
#[derive(Debug, Default)]
pub struct HeadlessPlayer {
    item: Option<Playable>,
    /// Position when the clock was last anchored.
    anchor: RationalTime,
    /// Set while playing.
    started: Option<Instant>,
}

impl HeadlessPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    fn duration(&self) -> RationalTime {
        self.item
            .as_ref()
            .map_or(RationalTime::ZERO, Playable::duration)
    }

    fn clamp(&self, time: RationalTime) -> RationalTime {
        time.clamp(RationalTime::ZERO, self.duration().max(RationalTime::ZERO))
    }

    fn reanchor(&mut self, at: RationalTime) {
        self.anchor = self.clamp(at);
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
    }
}

impl Player for HeadlessPlayer {
    fn is_playing(&self) -> bool {
        self.started.is_some()
    }

    fn play(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        self.anchor = self.current_time();
        self.started = None;
    }

    fn current_time(&self) -> RationalTime {
        let elapsed = self.started.map_or(RationalTime::ZERO, |t| {
            let micros = i64::try_from(t.elapsed().as_micros()).unwrap_or(i64::MAX / 2);
            RationalTime::new(micros, 1_000_000)
        });
        self.clamp(self.anchor + elapsed)
    }

    fn current_item(&self) -> Option<&Playable> {
        self.item.as_ref()
    }

    fn replace_current_item(&mut self, item: Playable) {
        self.item = Some(item);
        self.reanchor(RationalTime::ZERO);
    }

    fn seek(&mut self, to: RationalTime, _tolerance: SeekTolerance) {
        self.reanchor(to);
    }
}
