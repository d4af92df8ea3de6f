//! Fault-injecting backend wrappers.
//!
//! Wrap a real backend and make exactly one stage fail, or sabotage the
//! completion protocol itself. Deterministic by construction: the configured
//! fault fires every time, which keeps failure-path tests reproducible.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{CipherBackend, CipherHandle, CipherRequest, CipherVerdict, Submission};
use crate::cipher::{BLOCK_SIZE, BlockOp, CipherSuite, IV_SIZE};
use crate::digest::{DIGEST_SIZE, DigestAlgorithm, DigestBackend, DigestSession};
use crate::error::BackendFault;
use crate::gate::Completer;

/// Digest stage at which the wrapped backend fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestStage {
    /// Fail when the algorithm session is opened.
    Open,
    /// Fail when the per-invocation state is initialized.
    Init,
    /// Fail when input is fed.
    Update,
    /// Fail when the digest is finalized.
    Finalize,
}

/// Wraps a digest backend and injects `fault` at `stage`.
#[derive(Debug, Clone)]
pub struct FaultyDigestBackend<B> {
    inner: B,
    stage: DigestStage,
    fault: BackendFault,
}

impl<B> FaultyDigestBackend<B> {
    /// Backend that behaves like `inner` until `stage`, then reports `fault`.
    pub fn failing_at(inner: B, stage: DigestStage, fault: BackendFault) -> Self {
        Self { inner, stage, fault }
    }
}

impl<B: DigestBackend> DigestBackend for FaultyDigestBackend<B> {
    type Session = FaultyDigestSession<B::Session>;

    fn open(&self, algorithm: DigestAlgorithm) -> Result<Self::Session, BackendFault> {
        if self.stage == DigestStage::Open {
            return Err(self.fault.clone());
        }
        let inner = self.inner.open(algorithm)?;
        Ok(FaultyDigestSession { inner, stage: self.stage, fault: self.fault.clone() })
    }
}

/// Session wrapper that fails at the configured stage.
pub struct FaultyDigestSession<S> {
    inner: S,
    stage: DigestStage,
    fault: BackendFault,
}

impl<S: DigestSession> DigestSession for FaultyDigestSession<S> {
    fn init(&mut self) -> Result<(), BackendFault> {
        if self.stage == DigestStage::Init {
            return Err(self.fault.clone());
        }
        self.inner.init()
    }

    fn update(&mut self, input: &[u8]) -> Result<(), BackendFault> {
        if self.stage == DigestStage::Update {
            return Err(self.fault.clone());
        }
        self.inner.update(input)
    }

    fn finalize(&mut self, output: &mut [u8; DIGEST_SIZE]) -> Result<(), BackendFault> {
        if self.stage == DigestStage::Finalize {
            return Err(self.fault.clone());
        }
        self.inner.finalize(output)
    }
}

/// Ways to sabotage the cipher request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherSabotage {
    /// Refuse to open the suite handle.
    RefuseOpen(BackendFault),
    /// Refuse to allocate the request object.
    RefuseAllocation(BackendFault),
    /// Reject the installed key.
    RejectKey(BackendFault),
    /// Fail the submission call itself.
    RefuseSubmit(BackendFault),
    /// Complete synchronously with a failing verdict.
    FailCompletion(BackendFault),
    /// Go pending and drop the completer unfired.
    AbandonCompletion,
    /// Go pending and never complete; the completer is held alive, so the
    /// waiter sees a timeout or an interrupt, never an abandonment.
    WithholdCompletion,
}

/// Wraps a cipher backend and applies one [`CipherSabotage`].
pub struct FaultyCipherBackend<B> {
    inner: B,
    sabotage: CipherSabotage,
    held: Arc<Mutex<Vec<Completer<CipherVerdict>>>>,
}

impl<B> FaultyCipherBackend<B> {
    /// Backend that behaves like `inner` except for `sabotage`.
    pub fn sabotaged(inner: B, sabotage: CipherSabotage) -> Self {
        Self { inner, sabotage, held: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Completers withheld so far: pending waits that will never signal.
    pub fn withheld(&self) -> usize {
        lock_held(&self.held).len()
    }
}

impl<B: Clone> Clone for FaultyCipherBackend<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            sabotage: self.sabotage.clone(),
            held: Arc::clone(&self.held),
        }
    }
}

fn lock_held(
    held: &Mutex<Vec<Completer<CipherVerdict>>>,
) -> MutexGuard<'_, Vec<Completer<CipherVerdict>>> {
    held.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B: CipherBackend> CipherBackend for FaultyCipherBackend<B> {
    type Handle = FaultyCipherHandle<B::Handle>;

    fn open(&self, suite: CipherSuite) -> Result<Self::Handle, BackendFault> {
        if let CipherSabotage::RefuseOpen(fault) = &self.sabotage {
            return Err(fault.clone());
        }
        let inner = self.inner.open(suite)?;
        Ok(FaultyCipherHandle {
            inner,
            sabotage: self.sabotage.clone(),
            held: Arc::clone(&self.held),
        })
    }
}

/// Handle wrapper that forwards to the wrapped backend's handle.
pub struct FaultyCipherHandle<H> {
    inner: H,
    sabotage: CipherSabotage,
    held: Arc<Mutex<Vec<Completer<CipherVerdict>>>>,
}

impl<H: CipherHandle> CipherHandle for FaultyCipherHandle<H> {
    type Request = FaultyCipherRequest<H::Request>;

    fn allocate_request(&self) -> Result<Self::Request, BackendFault> {
        if let CipherSabotage::RefuseAllocation(fault) = &self.sabotage {
            return Err(fault.clone());
        }
        let inner = self.inner.allocate_request()?;
        Ok(FaultyCipherRequest {
            inner,
            sabotage: self.sabotage.clone(),
            held: Arc::clone(&self.held),
        })
    }
}

/// Request wrapper that applies the submission-level sabotage.
pub struct FaultyCipherRequest<R> {
    inner: R,
    sabotage: CipherSabotage,
    held: Arc<Mutex<Vec<Completer<CipherVerdict>>>>,
}

impl<R: CipherRequest> CipherRequest for FaultyCipherRequest<R> {
    fn install_key(&mut self, key: &[u8]) -> Result<(), BackendFault> {
        if let CipherSabotage::RejectKey(fault) = &self.sabotage {
            return Err(fault.clone());
        }
        self.inner.install_key(key)
    }

    fn submit(
        self,
        op: BlockOp,
        iv: [u8; IV_SIZE],
        block: [u8; BLOCK_SIZE],
        completer: Completer<CipherVerdict>,
    ) -> Result<Submission, BackendFault> {
        match self.sabotage {
            CipherSabotage::RefuseSubmit(fault) => Err(fault),
            CipherSabotage::FailCompletion(fault) => Ok(Submission::Completed(Err(fault))),
            CipherSabotage::AbandonCompletion => {
                drop(completer);
                Ok(Submission::Pending)
            },
            CipherSabotage::WithholdCompletion => {
                lock_held(&self.held).push(completer);
                Ok(Submission::Pending)
            },
            CipherSabotage::RefuseOpen(_)
            | CipherSabotage::RefuseAllocation(_)
            | CipherSabotage::RejectKey(_) => self.inner.submit(op, iv, block, completer),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use crate::backend::SoftwareCipherBackend;
    use crate::digest::{DigestEngine, Md5Backend};
    use crate::engine::{CipherConfig, CipherEngine};
    use crate::entropy::OsEntropy;
    use crate::error::EngineError;
    use crate::ledger::ResourceLedger;

    use super::*;

    fn digest_engine(
        stage: DigestStage,
        fault: BackendFault,
    ) -> (DigestEngine<FaultyDigestBackend<Md5Backend>>, ResourceLedger) {
        let ledger = ResourceLedger::new();
        let backend = FaultyDigestBackend::failing_at(Md5Backend, stage, fault);
        (DigestEngine::new(backend, ledger.clone()), ledger)
    }

    fn cipher_engine(
        sabotage: CipherSabotage,
    ) -> (CipherEngine<FaultyCipherBackend<SoftwareCipherBackend>, OsEntropy>, ResourceLedger)
    {
        let ledger = ResourceLedger::new();
        let backend = FaultyCipherBackend::sabotaged(SoftwareCipherBackend, sabotage);
        (
            CipherEngine::new(backend, OsEntropy, CipherConfig::default(), ledger.clone()),
            ledger,
        )
    }

    #[test]
    fn open_unavailability_maps_to_algorithm_unavailable() {
        let (engine, ledger) = digest_engine(DigestStage::Open, BackendFault::Unavailable);

        let err = engine.compute(DigestAlgorithm::Md5, b"x").unwrap_err();

        assert!(matches!(err, EngineError::AlgorithmUnavailable { .. }));
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn exhaustion_at_init_maps_to_out_of_memory() {
        let (engine, ledger) = digest_engine(DigestStage::Init, BackendFault::Exhausted);

        let err = engine.compute(DigestAlgorithm::Md5, b"x").unwrap_err();

        assert_eq!(err, EngineError::OutOfMemory { fault: BackendFault::Exhausted });
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn update_failure_keeps_the_stage_and_leaks_nothing() {
        let fault = BackendFault::Failed { reason: "update torpedoed".to_string() };
        let (engine, ledger) = digest_engine(DigestStage::Update, fault.clone());

        let err = engine.compute(DigestAlgorithm::Md5, b"x").unwrap_err();

        assert_eq!(err, EngineError::UpdateFailed { fault });
        assert_eq!(ledger.outstanding(), 0);
        // The invocation got as far as holding both digest resources.
        assert_eq!(ledger.acquired_of(crate::ledger::ResourceKind::DigestHandle), 1);
        assert_eq!(ledger.acquired_of(crate::ledger::ResourceKind::DigestState), 1);
    }

    #[test]
    fn finalize_failure_keeps_the_stage_and_leaks_nothing() {
        let fault = BackendFault::Failed { reason: "finalize torpedoed".to_string() };
        let (engine, ledger) = digest_engine(DigestStage::Finalize, fault.clone());

        let err = engine.compute(DigestAlgorithm::Md5, b"x").unwrap_err();

        assert_eq!(err, EngineError::FinalizeFailed { fault });
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn refused_suite_maps_to_algorithm_unavailable() {
        let (engine, ledger) = cipher_engine(CipherSabotage::RefuseOpen(BackendFault::Unavailable));

        let err = engine.encrypt_oneshot(b"payload").unwrap_err();

        assert!(matches!(err, EngineError::AlgorithmUnavailable { .. }));
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn exhausted_allocation_maps_to_out_of_memory() {
        let (engine, ledger) =
            cipher_engine(CipherSabotage::RefuseAllocation(BackendFault::Exhausted));

        let err = engine.encrypt_oneshot(b"payload").unwrap_err();

        assert_eq!(err, EngineError::OutOfMemory { fault: BackendFault::Exhausted });
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn rejected_key_fails_the_invocation_without_retry() {
        let fault = BackendFault::KeyRejected { reason: "weak key".to_string() };
        let (engine, ledger) = cipher_engine(CipherSabotage::RejectKey(fault.clone()));

        let err = engine.encrypt_oneshot(b"payload").unwrap_err();

        assert_eq!(err, EngineError::KeyRejected { fault });
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn refused_submission_maps_to_cipher_op_failed() {
        let fault = BackendFault::Failed { reason: "queue full".to_string() };
        let (engine, ledger) = cipher_engine(CipherSabotage::RefuseSubmit(fault.clone()));

        let err = engine.encrypt_oneshot(b"payload").unwrap_err();

        assert_eq!(err, EngineError::CipherOpFailed { fault });
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn failing_completion_maps_to_cipher_op_failed() {
        let fault = BackendFault::Failed { reason: "hardware said no".to_string() };
        let (engine, ledger) = cipher_engine(CipherSabotage::FailCompletion(fault.clone()));

        let err = engine.encrypt_oneshot(b"payload").unwrap_err();

        assert_eq!(err, EngineError::CipherOpFailed { fault });
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn abandoned_completion_maps_to_cipher_op_failed() {
        let (engine, ledger) = cipher_engine(CipherSabotage::AbandonCompletion);

        let err = engine.encrypt_oneshot(b"payload").unwrap_err();

        assert!(matches!(err, EngineError::CipherOpFailed { .. }));
        assert!(!err.is_transient());
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn withheld_completion_times_out_and_leaks_nothing() {
        let ledger = ResourceLedger::new();
        let backend = FaultyCipherBackend::sabotaged(
            SoftwareCipherBackend,
            CipherSabotage::WithholdCompletion,
        );
        let config = CipherConfig {
            completion_timeout: Some(Duration::from_millis(25)),
            ..CipherConfig::default()
        };
        let engine = CipherEngine::new(backend, OsEntropy, config, ledger.clone());

        let err = engine.encrypt_oneshot(b"payload").unwrap_err();

        assert_eq!(
            err,
            EngineError::CompletionTimedOut { waited: Duration::from_millis(25) }
        );
        assert!(err.is_transient());
        assert_eq!(ledger.outstanding(), 0);
        assert_eq!(engine.ledger().outstanding(), 0);
    }

    #[test]
    fn withheld_completion_can_be_interrupted() {
        let ledger = ResourceLedger::new();
        let backend = FaultyCipherBackend::sabotaged(
            SoftwareCipherBackend,
            CipherSabotage::WithholdCompletion,
        );
        let config = CipherConfig { completion_timeout: None, ..CipherConfig::default() };
        let engine = CipherEngine::new(backend, OsEntropy, config, ledger.clone());

        let interrupt = engine.interrupt_handle();
        let interrupting = thread::spawn(move || {
            thread::sleep(Duration::from_millis(25));
            interrupt.interrupt()
        });

        let err = engine.encrypt_oneshot(b"payload").unwrap_err();

        assert_eq!(err, EngineError::Interrupted);
        assert!(err.is_transient());
        assert!(interrupting.join().unwrap());
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn withheld_completers_are_observable() {
        let backend = FaultyCipherBackend::sabotaged(
            SoftwareCipherBackend,
            CipherSabotage::WithholdCompletion,
        );
        let probe = backend.clone();
        let config = CipherConfig {
            completion_timeout: Some(Duration::from_millis(5)),
            ..CipherConfig::default()
        };
        let engine = CipherEngine::new(backend, OsEntropy, config, ResourceLedger::new());

        assert_eq!(probe.withheld(), 0);
        let _ = engine.encrypt_oneshot(b"payload").unwrap_err();
        assert_eq!(probe.withheld(), 1);
    }
}
