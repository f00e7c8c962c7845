//! Selection clamping and position mapping through a full session.

use crate::support::{config, millis, open, range, scripted, secs};
use proptest::prelude::*;
use trimkit_core::{RationalTime, TimeRange};
use trimkit_editor::testing::GatedAsset;
use trimkit_editor::{
    to_display_position, to_player_seek_target, Gesture, SelectionState, TrimMode,
};

#[tokio::test]
async fn test_collapsed_start_handle_reopens_against_end() {
    let dir = tempfile::tempdir().unwrap();
    let (transcoder, _jobs) = scripted();
    let (mut session, _rx) = open(config(dir.path()), GatedAsset::ready(secs(10)), transcoder).await;

    session.coordinator_mut().on_range_committed(range(secs(5), secs(10)));
    assert!(session.begin_gesture(Gesture::AdjustStart));
    let clamped = session.update_range(range(millis(9500), secs(10))).unwrap();
    assert_eq!(clamped, range(secs(5), secs(10)));
    assert!(session.end_gesture(Gesture::AdjustStart));
    assert_eq!(session.selected_range(), range(secs(5), secs(10)));
}

#[tokio::test]
async fn test_start_handle_clamped_to_maximum_keeps_end() {
    let dir = tempfile::tempdir().unwrap();
    let (transcoder, _jobs) = scripted();
    let (mut session, _rx) = open(config(dir.path()), GatedAsset::ready(secs(10)), transcoder).await;

    session.coordinator_mut().on_range_committed(range(secs(5), secs(10)));
    session.begin_gesture(Gesture::AdjustStart);
    assert_eq!(
        session.update_range(range(secs(2), secs(10))),
        Some(range(secs(5), secs(10)))
    );
    session.end_gesture(Gesture::AdjustStart);
    assert_eq!(session.selected_range(), range(secs(5), secs(10)));
}

#[tokio::test]
async fn test_end_handle_clamped_keeps_start() {
    let dir = tempfile::tempdir().unwrap();
    let (transcoder, _jobs) = scripted();
    let (mut session, _rx) = open(config(dir.path()), GatedAsset::ready(secs(10)), transcoder).await;

    session.begin_gesture(Gesture::AdjustEnd);
    assert_eq!(
        session.update_range(range(secs(0), millis(300))),
        Some(range(secs(0), secs(1)))
    );
    assert_eq!(
        session.update_range(range(secs(0), secs(12))),
        Some(range(secs(0), secs(5)))
    );
    session.end_gesture(Gesture::AdjustEnd);
    assert_eq!(session.selected_range(), range(secs(0), secs(5)));
}

#[tokio::test]
async fn test_updates_outside_a_gesture_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let (transcoder, _jobs) = scripted();
    let (mut session, _rx) = open(config(dir.path()), GatedAsset::ready(secs(10)), transcoder).await;

    assert_eq!(session.update_range(range(secs(2), secs(4))), None);
    assert_eq!(session.selected_range(), range(secs(0), secs(5)));
    assert!(!session.end_gesture(Gesture::Scrub));
    assert_eq!(session.coordinator().trim().mode(), TrimMode::Idle);
}

#[tokio::test]
async fn test_scrub_seeks_player_inside_selection() {
    let dir = tempfile::tempdir().unwrap();
    let (transcoder, _jobs) = scripted();
    let (mut session, _rx) = open(config(dir.path()), GatedAsset::ready(secs(10)), transcoder).await;
    session.coordinator_mut().on_range_committed(range(secs(3), secs(6)));
    session.next_recomposition().await.unwrap();

    session.scrub_to(secs(4));
    let (target, _) = *session.coordinator().player().seeks.last().unwrap();
    assert_eq!(target, secs(1));
    assert_eq!(session.position(), secs(4));

    // The playhead is reported back in full-asset time.
    assert_eq!(session.tick(), secs(4));
}

fn arb_state() -> impl Strategy<Value = (SelectionState, RationalTime)> {
    (0i64..600, 1i64..600, 0i64..=1000).prop_map(|(start, len, frac)| {
        let full = TimeRange::full(secs(1200));
        let selected = TimeRange::new(secs(start), secs(len));
        let state = SelectionState {
            full_range: full,
            selected_range: selected,
            minimum_duration: secs(1),
            maximum_duration: secs(600),
            mode: TrimMode::Idle,
        };
        let position = selected.start + RationalTime::new(len * frac, 1000);
        (state, position)
    })
}

proptest! {
    #[test]
    fn seek_target_round_trips_through_display((state, display) in arb_state()) {
        let target = to_player_seek_target(display, &state);
        prop_assert_eq!(to_display_position(target, &state), display);
    }

    #[test]
    fn full_asset_modes_map_identically((state, display) in arb_state(), scrub in any::<bool>()) {
        let state = SelectionState {
            mode: if scrub { TrimMode::Scrubbing } else { TrimMode::AdjustingEnd },
            ..state
        };
        prop_assert_eq!(to_player_seek_target(display, &state), display);
        prop_assert_eq!(to_display_position(display, &state), display);
    }
}
