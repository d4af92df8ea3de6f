//! Error types for the slot and device layers.
//!
//! Each layer wraps the one below it: engine failures surface through
//! [`SlotError`], slot failures through [`DeviceError`]. Copy failures at the
//! embedding boundary map onto [`DeviceError::Io`] instead of being folded
//! into the transform taxonomy.

use std::io;

use cryptoslot_crypto::EngineError;
use thiserror::Error;

/// Buffer-level failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// The rendered length annotation does not fit behind the payload
    #[error("annotation of {annotation} bytes does not fit after {payload} payload bytes")]
    AnnotationOverflow {
        /// Payload bytes already in the buffer
        payload: usize,
        /// Rendered annotation length in bytes
        annotation: usize,
    },
}

/// Failures surfaced by a slot write.
///
/// A failed write leaves the slot idle with the buffer cleared; the caller
/// decides whether to retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    /// The transform engine failed
    #[error("transform failed: {0}")]
    Engine(#[from] EngineError),

    /// The buffer refused the operation
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),
}

impl SlotError {
    /// Returns true if retrying the same write may succeed.
    ///
    /// Only interrupted or timed-out cipher waits are transient; every other
    /// failure reproduces on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Engine(engine) => engine.is_transient(),
            Self::Buffer(_) => false,
        }
    }
}

/// Failures surfaced across the device boundary.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The slot rejected or failed the operation
    #[error("slot error: {0}")]
    Slot(#[from] SlotError),

    /// Copying bytes in or out of the embedding failed
    #[error("i/o fault: {0}")]
    Io(#[from] io::Error),
}

impl DeviceError {
    /// Returns true if retrying the operation may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Slot(slot) => slot.is_transient(),
            Self::Io(_) => false,
        }
    }
}
