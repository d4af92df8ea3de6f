//! Single-slot message buffer.
//!
//! A fixed 256-byte holding area sized for exactly one outstanding message.
//! Writers ingest raw bytes, the transform installs its result, readers drain
//! it. There is no queueing: every ingest replaces whatever was there.
//!
//! The buffer is not internally synchronized. It is owned exclusively by
//! [`TransformSlot`](crate::slot::TransformSlot), whose lock is the
//! concurrency contract.

use crate::error::BufferError;

/// Total buffer capacity in bytes.
pub const CAPACITY: usize = 256;

/// Bytes reserved for the echo annotation suffix.
///
/// The widest suffix the echo cap permits is `" (241 letters)"` at 14 bytes;
/// one extra byte of room is reserved beyond it.
pub const ANNOTATION_ROOM: usize = 15;

/// Largest payload echo mode accepts, leaving room for the annotation.
pub const ECHO_MAX_PAYLOAD: usize = CAPACITY - ANNOTATION_ROOM;

/// Holding area for exactly one outstanding message.
///
/// Invariant: `ready <= CAPACITY` at all times. Ingest truncates, annotation
/// is guarded, drain resets.
#[derive(Debug)]
pub struct MessageBuffer {
    data: [u8; CAPACITY],
    ready: usize,
}

impl MessageBuffer {
    /// An empty buffer with nothing readable.
    #[must_use]
    pub fn new() -> Self {
        Self { data: [0; CAPACITY], ready: 0 }
    }

    /// Copies at most `min(cap, CAPACITY)` bytes of `raw` into the buffer,
    /// truncating silently.
    ///
    /// Returns the count actually stored. Any previous content is replaced.
    pub fn ingest(&mut self, raw: &[u8], cap: usize) -> usize {
        let accepted = raw.len().min(cap).min(CAPACITY);
        self.data[..accepted].copy_from_slice(&raw[..accepted]);
        self.ready = accepted;
        accepted
    }

    /// Appends `" (<n> letters)"` after the ready bytes, where `n` is the
    /// current ready count.
    ///
    /// Returns the new ready count. Refuses with
    /// [`BufferError::AnnotationOverflow`] when the rendered suffix does not
    /// fit; the buffer content is untouched in that case. The guard is only
    /// reachable by ingesting with a cap above [`ECHO_MAX_PAYLOAD`].
    pub fn annotate(&mut self) -> Result<usize, BufferError> {
        let suffix = format!(" ({} letters)", self.ready);
        if self.ready + suffix.len() > CAPACITY {
            return Err(BufferError::AnnotationOverflow {
                payload: self.ready,
                annotation: suffix.len(),
            });
        }
        self.data[self.ready..self.ready + suffix.len()].copy_from_slice(suffix.as_bytes());
        self.ready += suffix.len();
        Ok(self.ready)
    }

    /// Installs a transform result as the readable payload, truncating to
    /// [`CAPACITY`].
    pub fn replace(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(CAPACITY);
        self.data[..len].copy_from_slice(&bytes[..len]);
        self.ready = len;
    }

    /// Copies up to `out.len()` ready bytes into `out` and resets the ready
    /// count to zero.
    ///
    /// Returns the number of bytes copied; zero when nothing is ready. Bytes
    /// beyond `out.len()` are dropped, not carried over to the next drain.
    pub fn drain(&mut self, out: &mut [u8]) -> usize {
        let drained = self.ready.min(out.len());
        out[..drained].copy_from_slice(&self.data[..drained]);
        self.ready = 0;
        drained
    }

    /// The ready bytes as a slice.
    #[must_use]
    pub fn readable(&self) -> &[u8] {
        &self.data[..self.ready]
    }

    /// Number of bytes currently ready.
    #[must_use]
    pub fn ready_len(&self) -> usize {
        self.ready
    }

    /// Discards any ready bytes.
    pub fn clear(&mut self) {
        self.ready = 0;
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}
