//! Cryptoslot Transform Core
//!
//! The single-slot transform device: a bounded message buffer, a
//! producer/consumer state machine, and the device contract callers open
//! handles against. The heavy lifting (digests, block cipher, completion
//! handling) lives in `cryptoslot-crypto`; this crate orchestrates it.
//!
//! # Slot Lifecycle
//!
//! A write ingests bytes, runs the mode's transform, and parks the result;
//! a read drains exactly that result:
//!
//! ```text
//!         write                transform ok              read
//! Idle ──────────► Ingesting ─────────────► ResultReady ──────► Idle
//!                      │
//!                      └─── transform error ───► Idle (buffer cleared)
//! ```
//!
//! There is exactly one slot per device and no isolation between callers:
//! every handle shares it, a new write discards an unread result, and the
//! last completed write wins. That is the device's contract, not an
//! accident.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod buffer;
pub mod device;
pub mod error;
pub mod slot;

pub use buffer::{ANNOTATION_ROOM, CAPACITY, ECHO_MAX_PAYLOAD, MessageBuffer};
pub use device::{DeviceHandle, SoftwareDevice, TransformDevice, software_device};
pub use error::{BufferError, DeviceError, SlotError};
pub use slot::{SlotState, TransformMode, TransformSlot};
