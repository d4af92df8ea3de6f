//! Cryptoslot Transform Engines
//!
//! Digest and block-cipher building blocks for the cryptoslot device. The
//! engines drive pluggable backends through a staged invocation sequence,
//! with every intermediate resource accounted for by a ledger guard.
//!
//! # Invocation Lifecycle
//!
//! ```text
//! DigestEngine                     CipherEngine
//!      │                                │
//!      ▼                                ▼
//! open(algorithm)                  open(suite)
//!      │                                │
//!      ▼                                ▼
//! init → update → finalize         allocate request → install key
//!      │                                │
//!      ▼                                ▼
//! 16-byte digest                   submit(IV, block) ──► Completed
//!                                        │
//!                                        ▼ Pending
//!                                  CompletionGate::wait
//! ```
//!
//! Every stage is fallible and mapped onto the engine error taxonomy; every
//! resource acquired along the way (handles, request objects, IV and scratch
//! buffers) is released on every exit path, success or failure, and the
//! [`ResourceLedger`] can prove it.
//!
//! # Security
//!
//! - Session keys are generated fresh per invocation and zeroized on drop
//! - IVs are never reused: one random IV per submission
//! - Backends only ever see the one installed copy of the key, which is
//!   itself zeroized when the request ends
//! - Completion is delivered through a one-shot gate; an interrupted or
//!   timed-out wait surfaces as a distinct, retriable error

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod backend;
pub mod cipher;
pub mod digest;
pub mod engine;
pub mod entropy;
pub mod error;
pub mod faulty;
pub mod gate;
pub mod ledger;

pub use backend::{
    CipherBackend, CipherHandle, CipherRequest, CipherVerdict, SoftwareCipherBackend, Submission,
    ThreadedCipherBackend,
};
pub use cipher::{
    BLOCK_SIZE, BlockOp, CipherOutput, CipherSuite, IV_SIZE, KEY_SIZE, SessionKey, decrypt_block,
    encrypt_block,
};
pub use digest::{
    DIGEST_SIZE, DigestAlgorithm, DigestBackend, DigestEngine, DigestOutput, DigestSession,
    Md5Backend,
};
pub use engine::{CipherConfig, CipherEngine, DEFAULT_COMPLETION_TIMEOUT, InterruptHandle};
pub use entropy::{EntropySource, OsEntropy};
pub use error::{BackendFault, EngineError};
pub use faulty::{CipherSabotage, DigestStage, FaultyCipherBackend, FaultyDigestBackend};
pub use gate::{Completer, CompletionGate, Interrupter, WaitError};
pub use ledger::{ResourceGuard, ResourceKind, ResourceLedger};
