//! The source asset seam: a readable media handle with a duration and tracks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use trimkit_core::{Orientation, RationalTime, Result, TimeRange};
use uuid::Uuid;

/// Media type of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
    Other,
}

/// Metadata for one track of a source asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Stream index inside the container.
    pub index: usize,
    pub kind: TrackKind,
    pub codec: String,
    /// Span of the track in asset time.
    pub time_range: TimeRange,
    /// Preferred display transform.
    pub orientation: Orientation,
}

/// A readable media asset.
///
/// Metadata loads are asynchronous and may fail with
/// [`TrimError::AssetLoadFailed`](trimkit_core::TrimError::AssetLoadFailed).
#[async_trait]
pub trait SourceAsset: Send + Sync + fmt::Debug {
    /// Stable identity of this asset.
    fn id(&self) -> Uuid;

    /// Location of the underlying media.
    fn path(&self) -> &Path;

    /// Exact duration of the asset.
    async fn full_duration(&self) -> Result<RationalTime>;

    /// All tracks of the asset, in container order.
    async fn tracks(&self) -> Result<Vec<TrackInfo>>;

    /// `[0, full_duration)`.
    async fn full_range(&self) -> Result<TimeRange> {
        Ok(TimeRange::full(self.full_duration().await?))
    }

    /// The first video track, if any.
    async fn first_video_track(&self) -> Result<Option<TrackInfo>> {
        Ok(self
            .tracks()
            .await?
            .into_iter()
            .find(|t| t.kind == TrackKind::Video))
    }
}
