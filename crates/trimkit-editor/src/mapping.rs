//! Conversion between player time and display (full-asset) time.
//!
//! When idle the player holds only the selected sub-range, so its local
//! zero is `selected_range.start` in full-asset time. During a gesture it
//! holds the whole asset and the two clocks agree.

use crate::trim::SelectionState;
use trimkit_core::RationalTime;

/// Player position to the position shown on the trim control.
#[inline]
pub fn to_display_position(player_position: RationalTime, state: &SelectionState) -> RationalTime {
    if state.mode.is_idle() {
        player_position + state.selected_range.start
    } else {
        player_position
    }
}

/// Position on the trim control to a player seek target.
#[inline]
pub fn to_player_seek_target(display_position: RationalTime, state: &SelectionState) -> RationalTime {
    if state.mode.is_idle() {
        display_position - state.selected_range.start
    } else {
        display_position
    }
}
