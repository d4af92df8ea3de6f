//! Transform slot state machine and mode strategies.
//!
//! The slot ties a [`MessageBuffer`] to the digest and cipher engines. A
//! write ingests bytes and runs the transform selected by the slot's
//! [`TransformMode`]; a read drains the installed result. One mode per
//! constructed slot; modes are never conflated at runtime.

use std::fmt;

use cryptoslot_crypto::{
    CipherBackend, CipherEngine, DigestAlgorithm, DigestBackend, DigestEngine, DigestOutput,
    EntropySource, InterruptHandle,
};

use crate::buffer::{CAPACITY, ECHO_MAX_PAYLOAD, MessageBuffer};
use crate::error::SlotError;

/// Deployment variant selecting what a write computes and a read returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    /// Digest the input; the readable result is the input text annotated
    /// with its length.
    DigestEcho,
    /// Digest the input; the readable result is the 16 raw digest bytes.
    DigestBytes,
    /// Encrypt the input's first block; the readable result is the IV
    /// followed by the ciphertext.
    CipherEncrypt,
}

impl TransformMode {
    /// Most payload bytes a write accepts in this mode.
    ///
    /// Echo mode reserves annotation room; the raw modes use the full
    /// buffer.
    #[must_use]
    pub fn ingest_cap(self) -> usize {
        match self {
            Self::DigestEcho => ECHO_MAX_PAYLOAD,
            Self::DigestBytes | Self::CipherEncrypt => CAPACITY,
        }
    }
}

impl fmt::Display for TransformMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DigestEcho => f.write_str("digest-echo"),
            Self::DigestBytes => f.write_str("digest-bytes"),
            Self::CipherEncrypt => f.write_str("cipher-encrypt"),
        }
    }
}

/// Observable slot lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Nothing ingested, nothing readable.
    Idle,
    /// A write is being processed.
    Ingesting,
    /// A transform result is waiting to be drained.
    ResultReady,
}

/// Single-slot transform state machine.
///
/// A write drives `Idle → Ingesting → ResultReady`; a read drains back to
/// `Idle`. A failed transform reverts to `Idle` with the buffer cleared.
/// Writing over an unread result discards it: the slot holds exactly one
/// outstanding message, never a queue.
pub struct TransformSlot<D, C, E> {
    mode: TransformMode,
    buffer: MessageBuffer,
    digest: DigestEngine<D>,
    cipher: CipherEngine<C, E>,
    state: SlotState,
    last_digest: Option<DigestOutput>,
}

impl<D, C, E> TransformSlot<D, C, E>
where
    D: DigestBackend,
    C: CipherBackend,
    E: EntropySource,
{
    /// Slot in `mode` over the given engines, starting idle.
    pub fn new(mode: TransformMode, digest: DigestEngine<D>, cipher: CipherEngine<C, E>) -> Self {
        Self {
            mode,
            buffer: MessageBuffer::new(),
            digest,
            cipher,
            state: SlotState::Idle,
            last_digest: None,
        }
    }

    /// Ingests `raw` and runs the mode's transform.
    ///
    /// Returns the number of payload bytes accepted: `raw.len()` truncated
    /// to the mode cap. An unread previous result is silently discarded. On
    /// failure the slot reverts to idle with the buffer cleared and the
    /// error propagates to the caller.
    pub fn write(&mut self, raw: &[u8]) -> Result<usize, SlotError> {
        if self.state == SlotState::ResultReady {
            tracing::debug!(mode = %self.mode, "unread result discarded by new write");
        }
        self.state = SlotState::Ingesting;
        let accepted = self.buffer.ingest(raw, self.mode.ingest_cap());
        match self.transform() {
            Ok(()) => {
                self.state = SlotState::ResultReady;
                tracing::debug!(
                    mode = %self.mode,
                    accepted,
                    ready = self.buffer.ready_len(),
                    "write transformed"
                );
                Ok(accepted)
            },
            Err(error) => {
                self.buffer.clear();
                self.state = SlotState::Idle;
                Err(error)
            },
        }
    }

    fn transform(&mut self) -> Result<(), SlotError> {
        match self.mode {
            TransformMode::DigestEcho => {
                let digest = self.digest.compute(DigestAlgorithm::Md5, self.buffer.readable())?;
                self.last_digest = Some(digest);
                self.buffer.annotate()?;
                Ok(())
            },
            TransformMode::DigestBytes => {
                let digest = self.digest.compute(DigestAlgorithm::Md5, self.buffer.readable())?;
                self.last_digest = Some(digest);
                self.buffer.replace(digest.as_bytes());
                Ok(())
            },
            TransformMode::CipherEncrypt => {
                let output = self.cipher.encrypt_oneshot(self.buffer.readable())?;
                self.buffer.replace(&output.to_bytes());
                Ok(())
            },
        }
    }

    /// Drains the readable result into `out`.
    ///
    /// Returns the number of bytes copied; zero when no result is ready,
    /// which is not an error. Draining consumes the result.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        match self.state {
            SlotState::ResultReady => {
                let drained = self.buffer.drain(out);
                self.state = SlotState::Idle;
                tracing::debug!(mode = %self.mode, drained, "result drained");
                drained
            },
            // Ingesting is only observable after a writer panicked mid-write;
            // either way there is nothing to drain.
            SlotState::Idle | SlotState::Ingesting => 0,
        }
    }

    /// The slot's fixed mode.
    #[must_use]
    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Digest retained by the most recent successful digest-mode write.
    #[must_use]
    pub fn last_digest(&self) -> Option<DigestOutput> {
        self.last_digest
    }

    /// Handle for interrupting a pending cipher wait from another thread.
    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.cipher.interrupt_handle()
    }
}
