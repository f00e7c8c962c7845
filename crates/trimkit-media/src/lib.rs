//! TrimKit Media - source assets, composition and FFmpeg transcoding
//!
//! This crate handles:
//! - Media file probing (ffprobe) behind the [`SourceAsset`] seam
//! - Composing a playable sub-range of a source
//! - Quality presets and transcoding through FFmpeg

pub mod asset;
pub mod composition;
pub mod export;
pub mod probe;

pub use asset::{SourceAsset, TrackInfo, TrackKind};
pub use composition::{compose, Composition, CompositionTrack, Playable};
pub use export::{
    AudioCodec, EncodeSettings, ExportCancel, FfmpegTranscoder, PresetId, TranscodeJob,
    TranscodeProfile, TranscodeProgress, TranscodeRequest, Transcoder, VideoCodec,
};
pub use probe::{FileAsset, MediaProbe, VideoStreamInfo};

/// Check that the FFmpeg executables can be found.
pub fn ffmpeg_available() -> bool {
    let found = ffmpeg_sidecar::command::ffmpeg_is_installed();
    tracing::debug!(found, "Checked for ffmpeg");
    found
}
