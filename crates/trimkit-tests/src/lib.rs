//! Integration test crate for TrimKit.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It drives whole editing sessions through trimkit-editor against the
//! seams defined in trimkit-media.

#[cfg(test)]
mod support;

#[cfg(test)]
mod selection;

#[cfg(test)]
mod preview;

#[cfg(test)]
mod export;

#[cfg(test)]
mod ffmpeg;
