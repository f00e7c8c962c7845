//! TrimKit Editor - trim, preview and export coordination
//!
//! Takes gesture events from a trim control, keeps a player showing the
//! selected range (or the whole asset while a handle is dragged), and
//! exports the selection with progress and cancellation.

pub mod config;
pub mod export;
pub mod mapping;
pub mod playback;
pub mod player;
pub mod recompose;
pub mod session;
pub mod trim;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::EditorConfig;
pub use export::{ExportOutcome, ExportPipeline, ExportRequest, ExportStream};
pub use mapping::{to_display_position, to_player_seek_target};
pub use playback::{Applied, PlaybackCoordinator};
pub use player::{HeadlessPlayer, Player, SeekTolerance};
pub use recompose::{Recomposed, Recomposer};
pub use session::{EditSession, SessionCancel, SessionOutcome, SessionReceiver};
pub use trim::{Gesture, SelectionState, TrimMode, TrimStateMachine};
