//! Staged digest computation over pluggable backends.
//!
//! The digest path follows a fixed pipeline: open the algorithm, initialize
//! per-invocation state, feed the whole input in a single update, finalize
//! into a fixed 16-byte output. Each stage is fallible and maps onto its own
//! error variant, and the handle/state pair is tracked by ledger guards that
//! release on every exit path.

use std::fmt;

use md5::{Digest, Md5};

use crate::error::{BackendFault, EngineError};
use crate::ledger::{ResourceKind, ResourceLedger};

/// Digest output width in bytes.
pub const DIGEST_SIZE: usize = 16;

/// Digest algorithms the device can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// MD5, the device's fixed choice.
    Md5,
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => f.write_str("md5"),
        }
    }
}

/// A fixed 16-byte digest result.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DigestOutput {
    bytes: [u8; DIGEST_SIZE],
}

impl DigestOutput {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.bytes
    }
}

impl From<[u8; DIGEST_SIZE]> for DigestOutput {
    fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self { bytes }
    }
}

/// Lowercase hex, the conventional rendering for digests.
impl fmt::Display for DigestOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.bytes {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for DigestOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DigestOutput({self})")
    }
}

/// Provider of digest algorithms.
pub trait DigestBackend: Send + Sync + 'static {
    /// Per-invocation session type.
    type Session: DigestSession;

    /// Open a session for `algorithm`.
    fn open(&self, algorithm: DigestAlgorithm) -> Result<Self::Session, BackendFault>;
}

/// One staged digest computation.
///
/// Callers drive the stages in order: `init`, one `update`, `finalize`.
/// Backends may reject out-of-order use.
pub trait DigestSession {
    /// Initialize the per-invocation state.
    fn init(&mut self) -> Result<(), BackendFault>;

    /// Feed input into the state.
    fn update(&mut self, input: &[u8]) -> Result<(), BackendFault>;

    /// Produce the digest into `output`, ending the session.
    fn finalize(&mut self, output: &mut [u8; DIGEST_SIZE]) -> Result<(), BackendFault>;
}

/// Software MD5 backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Backend;

impl DigestBackend for Md5Backend {
    type Session = Md5Session;

    fn open(&self, algorithm: DigestAlgorithm) -> Result<Md5Session, BackendFault> {
        match algorithm {
            DigestAlgorithm::Md5 => Ok(Md5Session::default()),
        }
    }
}

/// Staged MD5 computation state.
#[derive(Default)]
pub struct Md5Session {
    context: Option<Md5>,
}

impl DigestSession for Md5Session {
    fn init(&mut self) -> Result<(), BackendFault> {
        self.context = Some(Md5::new());
        Ok(())
    }

    fn update(&mut self, input: &[u8]) -> Result<(), BackendFault> {
        match self.context.as_mut() {
            Some(context) => {
                context.update(input);
                Ok(())
            },
            None => Err(BackendFault::Failed { reason: "update before init".to_string() }),
        }
    }

    fn finalize(&mut self, output: &mut [u8; DIGEST_SIZE]) -> Result<(), BackendFault> {
        match self.context.take() {
            Some(context) => {
                output.copy_from_slice(&context.finalize());
                Ok(())
            },
            None => Err(BackendFault::Failed { reason: "finalize before init".to_string() }),
        }
    }
}

/// Drives a digest backend through the staged invocation sequence.
pub struct DigestEngine<B> {
    backend: B,
    ledger: ResourceLedger,
}

impl<B: DigestBackend> DigestEngine<B> {
    /// Engine over `backend`, accounting resources in `ledger`.
    pub fn new(backend: B, ledger: ResourceLedger) -> Self {
        Self { backend, ledger }
    }

    /// Resource ledger shared by this engine.
    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Compute the digest of `input` in one staged invocation.
    ///
    /// The whole input is fed as a single update; an empty input is fed
    /// as-is and yields the algorithm's empty-message digest. Exhaustion at
    /// the open or init stage maps to [`EngineError::OutOfMemory`].
    pub fn compute(
        &self,
        algorithm: DigestAlgorithm,
        input: &[u8],
    ) -> Result<DigestOutput, EngineError> {
        let mut session = self
            .backend
            .open(algorithm)
            .map_err(|fault| open_error(algorithm, fault))?;
        let _handle_guard = self.ledger.acquire(ResourceKind::DigestHandle);

        session.init().map_err(|fault| match fault {
            BackendFault::Exhausted => EngineError::OutOfMemory { fault: BackendFault::Exhausted },
            other => EngineError::InitFailed { fault: other },
        })?;
        let _state_guard = self.ledger.acquire(ResourceKind::DigestState);

        session.update(input).map_err(|fault| EngineError::UpdateFailed { fault })?;

        let mut output = [0u8; DIGEST_SIZE];
        session.finalize(&mut output).map_err(|fault| EngineError::FinalizeFailed { fault })?;

        tracing::debug!(algorithm = %algorithm, input_len = input.len(), "digest computed");
        Ok(DigestOutput::from(output))
    }
}

fn open_error(algorithm: DigestAlgorithm, fault: BackendFault) -> EngineError {
    match fault {
        BackendFault::Exhausted => EngineError::OutOfMemory { fault: BackendFault::Exhausted },
        other => {
            EngineError::AlgorithmUnavailable { algorithm: algorithm.to_string(), fault: other }
        },
    }
}
