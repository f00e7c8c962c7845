//! Composed assets: a source clipped to a time range and re-based at zero.

use crate::asset::{SourceAsset, TrackKind};
use std::sync::Arc;
use tracing::debug;
use trimkit_core::{Orientation, RationalTime, Result, TimeRange, TrimError};
use uuid::Uuid;

/// One track of a [`Composition`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionTrack {
    /// Stream index in the source container.
    pub source_index: usize,
    pub kind: TrackKind,
    /// Span of source media inserted into this track.
    pub source_range: TimeRange,
    /// Where the inserted media begins in composed time.
    pub composed_start: RationalTime,
    pub orientation: Orientation,
}

/// The media of a source between two times, placed at composed time zero.
#[derive(Debug)]
pub struct Composition {
    id: Uuid,
    source: Arc<dyn SourceAsset>,
    source_range: TimeRange,
    tracks: Vec<CompositionTrack>,
}

impl Composition {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &Arc<dyn SourceAsset> {
        &self.source
    }

    /// Range of the source this composition covers.
    pub fn source_range(&self) -> TimeRange {
        self.source_range
    }

    pub fn tracks(&self) -> &[CompositionTrack] {
        &self.tracks
    }

    /// Composed duration; equal to the length of the source range.
    pub fn duration(&self) -> RationalTime {
        self.source_range.duration
    }

    /// Map a composed time back to source time.
    pub fn to_source_time(&self, composed: RationalTime) -> RationalTime {
        self.source_range
            .clamp_time(composed + self.source_range.start)
    }
}

/// Something a player can load: the untouched source or a composition.
#[derive(Debug, Clone)]
pub enum Playable {
    /// The source asset itself, used when the whole asset is selected.
    Source {
        asset: Arc<dyn SourceAsset>,
        full_range: TimeRange,
    },
    Composition(Arc<Composition>),
}

impl Playable {
    /// Reference identity. Two playables are the same only if they share
    /// the same underlying allocation.
    pub fn same_as(&self, other: &Playable) -> bool {
        match (self, other) {
            (Self::Source { asset: a, .. }, Self::Source { asset: b, .. }) => {
                Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
            }
            (Self::Composition(a), Self::Composition(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Playable length.
    pub fn duration(&self) -> RationalTime {
        match self {
            Self::Source { full_range, .. } => full_range.duration,
            Self::Composition(c) => c.duration(),
        }
    }

    /// The asset media is read from.
    pub fn source(&self) -> &Arc<dyn SourceAsset> {
        match self {
            Self::Source { asset, .. } => asset,
            Self::Composition(c) => c.source(),
        }
    }

    /// Range of the source covered by this playable.
    pub fn source_range(&self) -> TimeRange {
        match self {
            Self::Source { full_range, .. } => *full_range,
            Self::Composition(c) => c.source_range(),
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source { .. })
    }
}

/// Build a playable for `range` of `source`.
///
/// Selecting the full range returns the source itself. Any other range
/// yields a [`Composition`] whose tracks hold exactly the source media in
/// `range`, starting at composed time zero, all carrying the orientation of
/// the source's first video track.
pub async fn compose(source: Arc<dyn SourceAsset>, range: TimeRange) -> Result<Playable> {
    let full_range = source.full_range().await?;

    if range == full_range {
        debug!(range = %range, "Full range selected, using source as-is");
        return Ok(Playable::Source {
            asset: source,
            full_range,
        });
    }

    if range.duration <= RationalTime::ZERO {
        return Err(TrimError::CompositionFailed(format!("Empty range {range}")));
    }
    if !full_range.contains_range(range) {
        return Err(TrimError::CompositionFailed(format!(
            "Range {range} is outside the source {full_range}"
        )));
    }

    let source_tracks = source.tracks().await?;
    if source_tracks.is_empty() {
        return Err(TrimError::CompositionFailed(
            "Source has no tracks".to_string(),
        ));
    }

    let orientation = source_tracks
        .iter()
        .find(|t| t.kind == TrackKind::Video)
        .map(|t| t.orientation)
        .unwrap_or_default();

    let tracks: Vec<CompositionTrack> = source_tracks
        .iter()
        .filter(|t| t.kind != TrackKind::Other)
        .filter_map(|t| {
            let inserted = t.time_range.intersection(range)?;
            Some(CompositionTrack {
                source_index: t.index,
                kind: t.kind,
                source_range: inserted,
                composed_start: inserted.start - range.start,
                orientation,
            })
        })
        .collect();

    if tracks.is_empty() {
        return Err(TrimError::CompositionFailed(format!(
            "No source media in {range}"
        )));
    }

    Ok(Playable::Composition(Arc::new(Composition {
        id: Uuid::new_v4(),
        source,
        source_range: range,
        tracks,
    })))
}
