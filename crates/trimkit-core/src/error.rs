//! Error types for TrimKit.

use thiserror::Error;

/// Main error type for trim, recomposition and export operations.
///
/// Cloneable so a failure can be carried inside progress events and the
/// one-shot session outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrimError {
    /// Source metadata (duration, tracks) could not be read.
    #[error("Asset load failed: {0}")]
    AssetLoadFailed(String),

    /// The requested range is invalid for the source or insertion was rejected.
    #[error("Composition failed: {0}")]
    CompositionFailed(String),

    /// The transcode backend reported an error.
    #[error("Export failed: {0}")]
    ExportFailed(String),

    /// User-initiated cancellation. Not a failure.
    #[error("Cancelled")]
    Cancelled,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Coarse classification of a [`TrimError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AssetLoadFailed,
    CompositionFailed,
    ExportFailed,
    Cancelled,
    InvalidParameter,
}

impl TrimError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AssetLoadFailed(_) => ErrorKind::AssetLoadFailed,
            Self::CompositionFailed(_) => ErrorKind::CompositionFailed,
            Self::ExportFailed(_) => ErrorKind::ExportFailed,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::InvalidParameter(_) => ErrorKind::InvalidParameter,
        }
    }

    /// True for user cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias for TrimKit operations.
pub type Result<T> = std::result::Result<T, TrimError>;
