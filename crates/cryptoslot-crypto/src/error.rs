//! Error taxonomy for the transform engines.
//!
//! Two layers: [`BackendFault`] is what a digest or cipher backend reports
//! from a single lifecycle stage; [`EngineError`] is the engine-level
//! classification that pins each failure to the stage that produced it.
//! `std::io::Error` never appears at this layer; copy failures belong to
//! the device boundary.

use std::time::Duration;

use thiserror::Error;

use crate::gate::WaitError;

/// Failure reported by a backend from one lifecycle stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendFault {
    /// The requested algorithm or suite is not provided by this backend.
    #[error("not provided by this backend")]
    Unavailable,

    /// The backend could not allocate a handle, state, or request object.
    #[error("backend resources exhausted")]
    Exhausted,

    /// The backend refused the offered key material.
    #[error("key material rejected: {reason}")]
    KeyRejected {
        /// Backend-reported reason for the rejection.
        reason: String,
    },

    /// Any other stage failure.
    #[error("backend operation failed: {reason}")]
    Failed {
        /// Backend-reported reason for the failure.
        reason: String,
    },
}

/// Errors surfaced by the digest and cipher engines.
///
/// Each variant corresponds to one failure site of the staged invocation
/// sequence, so callers can tell exactly which stage gave out. Allocation
/// exhaustion maps to [`OutOfMemory`](Self::OutOfMemory) regardless of the
/// stage it occurred at.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The backend does not provide the requested algorithm or suite.
    #[error("algorithm {algorithm} unavailable: {fault}")]
    AlgorithmUnavailable {
        /// Name of the algorithm or suite that was requested.
        algorithm: String,
        /// Underlying backend fault.
        fault: BackendFault,
    },

    /// Digest state initialization failed.
    #[error("digest init failed: {fault}")]
    InitFailed {
        /// Underlying backend fault.
        fault: BackendFault,
    },

    /// Feeding input into the digest state failed.
    #[error("digest update failed: {fault}")]
    UpdateFailed {
        /// Underlying backend fault.
        fault: BackendFault,
    },

    /// Producing the final digest bytes failed.
    #[error("digest finalize failed: {fault}")]
    FinalizeFailed {
        /// Underlying backend fault.
        fault: BackendFault,
    },

    /// A handle, state, or request allocation was refused for lack of
    /// resources.
    #[error("backend allocation failed: {fault}")]
    OutOfMemory {
        /// Underlying backend fault.
        fault: BackendFault,
    },

    /// The cipher backend rejected the generated session key.
    ///
    /// Never retried with different material: a rejection fails the whole
    /// invocation.
    #[error("cipher key rejected: {fault}")]
    KeyRejected {
        /// Underlying backend fault.
        fault: BackendFault,
    },

    /// The cipher submission or its completion reported failure.
    #[error("cipher operation failed: {fault}")]
    CipherOpFailed {
        /// Underlying backend fault.
        fault: BackendFault,
    },

    /// The wait for a pending completion was interrupted.
    ///
    /// Distinct from operational failure: the submission itself may still
    /// complete, the caller just stopped waiting.
    #[error("wait for cipher completion interrupted")]
    Interrupted,

    /// The bounded wait for a pending completion elapsed.
    #[error("no cipher completion within {waited:?}")]
    CompletionTimedOut {
        /// How long the caller waited.
        waited: Duration,
    },
}

impl EngineError {
    /// Returns true if this error is transient and the same request may
    /// succeed on retry.
    ///
    /// Only the two wait outcomes qualify: an interrupted or timed-out wait
    /// says nothing about the operation itself. Stage failures are never
    /// transient - the backend has told us something definitive.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Interrupted | Self::CompletionTimedOut { .. })
    }
}

/// A failed gate wait, classified for the engine taxonomy.
///
/// An abandoned completer is a backend contract violation and therefore an
/// operation failure, not a wait outcome.
impl From<WaitError> for EngineError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Interrupted => Self::Interrupted,
            WaitError::TimedOut { waited } => Self::CompletionTimedOut { waited },
            WaitError::Abandoned => Self::CipherOpFailed {
                fault: BackendFault::Failed {
                    reason: "completer dropped without signaling".to_string(),
                },
            },
        }
    }
}
