//! Preview recomposition: ordering, identity and failure handling.

use crate::support::{config, open, range, scripted, secs, FlakyAsset, SteppedAsset};
use std::sync::Arc;
use trimkit_core::{ErrorKind, TimeRange};
use trimkit_editor::testing::{GatedAsset, RecordingPlayer};
use trimkit_editor::{Applied, Gesture, PlaybackCoordinator, Recomposer, SessionOutcome, TrimStateMachine};
use trimkit_media::{compose, SourceAsset};

fn coordinator(source: Arc<dyn SourceAsset>, max_secs: i64) -> PlaybackCoordinator<RecordingPlayer> {
    let trim = TrimStateMachine::new(TimeRange::full(secs(10)), secs(1), secs(max_secs));
    PlaybackCoordinator::new(RecordingPlayer::new(), trim, Recomposer::new(source))
}

#[tokio::test]
async fn test_only_latest_request_reaches_player() {
    let asset = Arc::new(GatedAsset::new(secs(10)));
    let gate = asset.gate();
    let mut coordinator = coordinator(asset, 5);

    let r1 = coordinator.on_range_committed(range(secs(0), secs(2)));
    let r2 = coordinator.on_range_committed(range(secs(1), secs(4)));
    let r3 = coordinator.on_range_committed(range(secs(2), secs(5)));
    assert!(r1 < r2 && r2 < r3);
    assert_eq!(coordinator.recomposer().in_flight(), 3);

    gate.open();
    let applied = coordinator.next_recomposition().await.unwrap();
    assert_eq!(applied, Applied::Swapped { generation: r3 });
    assert_eq!(coordinator.player().replacements, 1);
    assert_eq!(
        coordinator.displayed().unwrap().source_range(),
        range(secs(2), secs(5))
    );
    assert!(coordinator.next_recomposition().await.is_none());
}

#[tokio::test]
async fn test_older_results_finishing_last_are_dropped() {
    let asset = SteppedAsset::new(secs(10), 3);
    let mut coordinator = coordinator(asset.clone(), 5);

    // Issue one at a time so the n-th load belongs to the n-th request.
    let r1 = coordinator.on_range_committed(range(secs(0), secs(2)));
    asset.wait_for_loads(1).await;
    let r2 = coordinator.on_range_committed(range(secs(1), secs(4)));
    asset.wait_for_loads(2).await;
    let r3 = coordinator.on_range_committed(range(secs(2), secs(5)));
    asset.wait_for_loads(3).await;

    asset.release(2);
    assert_eq!(
        coordinator.next_recomposition().await,
        Some(Applied::Swapped { generation: r3 })
    );
    assert_eq!(coordinator.player().replacements, 1);

    asset.release(0);
    asset.release(1);
    assert_eq!(coordinator.next_recomposition().await, None);
    assert!(coordinator.pump().is_none());
    assert_eq!(coordinator.recomposer().in_flight(), 0);
    assert!(r1 < r2 && r2 < r3);
    assert_eq!(coordinator.player().replacements, 1);
    assert_eq!(
        coordinator.displayed().unwrap().source_range(),
        range(secs(2), secs(5))
    );
}

#[tokio::test]
async fn test_full_range_composes_to_the_source_itself() {
    let source = GatedAsset::ready(secs(10));
    let playable = compose(Arc::clone(&source), TimeRange::full(secs(10))).await.unwrap();
    assert!(playable.is_source());
    assert!(Arc::ptr_eq(playable.source(), &source));

    let mut coordinator = coordinator(source, 600);
    assert_eq!(coordinator.trim().selected_range(), TimeRange::full(secs(10)));
    coordinator.on_trim_mode_changed();
    coordinator.next_recomposition().await.unwrap();
    assert!(coordinator.displayed().unwrap().is_source());
}

#[tokio::test]
async fn test_gesture_shows_whole_asset_then_selection() {
    let dir = tempfile::tempdir().unwrap();
    let (transcoder, _jobs) = scripted();
    let (mut session, _rx) = open(config(dir.path()), GatedAsset::ready(secs(10)), transcoder).await;
    session.next_recomposition().await.unwrap();
    assert!(!session.coordinator().displayed().unwrap().is_source());

    session.begin_gesture(Gesture::AdjustEnd);
    session.next_recomposition().await.unwrap();
    assert!(session.coordinator().displayed().unwrap().is_source());

    session.update_range(range(secs(0), secs(3)));
    session.end_gesture(Gesture::AdjustEnd);
    session.next_recomposition().await.unwrap();
    let displayed = session.coordinator().displayed().unwrap();
    assert_eq!(displayed.source_range(), range(secs(0), secs(3)));
    assert_eq!(displayed.duration(), secs(3));
}

#[tokio::test]
async fn test_failed_recomposition_reports_once_and_keeps_last_asset() {
    let dir = tempfile::tempdir().unwrap();
    let (transcoder, _jobs) = scripted();
    let (mut session, rx) = open(config(dir.path()), FlakyAsset::new(secs(10), 1), transcoder).await;
    assert!(matches!(
        session.next_recomposition().await,
        Some(Applied::Swapped { .. })
    ));

    session.begin_gesture(Gesture::AdjustEnd);
    session.next_recomposition().await.unwrap();
    session.update_range(range(secs(0), secs(3)));
    session.end_gesture(Gesture::AdjustEnd);

    let applied = session.next_recomposition().await.unwrap();
    let Applied::Failed { error, .. } = applied else {
        panic!("expected failure, got {applied:?}");
    };
    assert_eq!(error.kind(), ErrorKind::AssetLoadFailed);
    assert!(session.coordinator().displayed().unwrap().is_source());
    assert!(session.is_finished());

    // A second failure does not produce a second outcome.
    session.begin_gesture(Gesture::Scrub);
    session.next_recomposition().await.unwrap();
    session.end_gesture(Gesture::Scrub);
    assert!(matches!(
        session.next_recomposition().await,
        Some(Applied::Failed { .. })
    ));

    let SessionOutcome::Failed(reported) = rx.await.unwrap() else {
        panic!("expected a failed outcome");
    };
    assert_eq!(reported.kind(), ErrorKind::AssetLoadFailed);
}
