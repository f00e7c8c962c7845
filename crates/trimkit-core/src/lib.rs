//! TrimKit Core - Foundation types for trimming
//!
//! This crate provides the fundamental types used throughout TrimKit:
//! - Time representation (RationalTime, FrameRate, TimeRange)
//! - Track orientation
//! - The shared error taxonomy

pub mod error;
pub mod geometry;
pub mod time;

pub use error::{ErrorKind, Result, TrimError};
pub use geometry::Orientation;
pub use time::{FrameRate, RationalTime, TimeRange};
