//! Cipher engine: the staged single-block invocation sequence.
//!
//! Every invocation is self-contained: fresh handle, fresh request, fresh
//! key and IV, one scratch block, one completion gate. Nothing is reused
//! across invocations, so a failure at any stage releases exactly what that
//! invocation acquired and nothing else.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::backend::{CipherBackend, CipherHandle, CipherRequest, CipherVerdict, Submission};
use crate::cipher::{BLOCK_SIZE, BlockOp, CipherOutput, CipherSuite, IV_SIZE, SessionKey};
use crate::entropy::EntropySource;
use crate::error::{BackendFault, EngineError};
use crate::gate::{CompletionGate, Interrupter};
use crate::ledger::{ResourceKind, ResourceLedger};

/// Default bound on the pending-completion wait.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for the cipher engine.
#[derive(Debug, Clone)]
pub struct CipherConfig {
    /// Suite requested from the backend on every invocation.
    pub suite: CipherSuite,
    /// Bound on the pending-completion wait; `None` waits indefinitely.
    pub completion_timeout: Option<Duration>,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            suite: CipherSuite::Aes256Cbc,
            completion_timeout: Some(DEFAULT_COMPLETION_TIMEOUT),
        }
    }
}

type PendingInterrupter = Arc<Mutex<Option<Interrupter<CipherVerdict>>>>;

/// Interrupts the cipher wait currently pending, if any.
///
/// Obtained from [`CipherEngine::interrupt_handle`] and usable from any
/// thread without holding whatever lock guards the engine itself.
#[derive(Clone)]
pub struct InterruptHandle {
    pending: PendingInterrupter,
}

impl InterruptHandle {
    /// Fire an interrupt at the pending wait.
    ///
    /// Returns `true` when a wait was pending and received the interrupt.
    pub fn interrupt(&self) -> bool {
        match lock_pending(&self.pending).as_ref() {
            Some(interrupter) => interrupter.interrupt(),
            None => false,
        }
    }
}

fn lock_pending(
    pending: &PendingInterrupter,
) -> MutexGuard<'_, Option<Interrupter<CipherVerdict>>> {
    // A panicking holder cannot leave the Option in a broken state, so the
    // poisoned value is safe to adopt.
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives a cipher backend through the staged single-block sequence.
pub struct CipherEngine<B, E> {
    backend: B,
    entropy: E,
    config: CipherConfig,
    ledger: ResourceLedger,
    pending: PendingInterrupter,
}

impl<B: CipherBackend, E: EntropySource> CipherEngine<B, E> {
    /// Engine over `backend`, drawing key and IV material from `entropy`.
    pub fn new(backend: B, entropy: E, config: CipherConfig, ledger: ResourceLedger) -> Self {
        Self { backend, entropy, config, ledger, pending: Arc::new(Mutex::new(None)) }
    }

    /// Resource ledger shared by this engine.
    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Handle for interrupting a pending wait from outside the engine.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle { pending: Arc::clone(&self.pending) }
    }

    /// Encrypt the first block of `payload` under a fresh key and IV.
    ///
    /// Payloads shorter than a block are zero-padded; bytes beyond the first
    /// block are ignored. The generated key is installed into the request,
    /// used for the single submission, and zeroized on return - the IV in
    /// the output is the only generated material that survives.
    pub fn encrypt_oneshot(&self, payload: &[u8]) -> Result<CipherOutput, EngineError> {
        let handle = self
            .backend
            .open(self.config.suite)
            .map_err(|fault| open_error(self.config.suite, fault))?;
        let _handle_guard = self.ledger.acquire(ResourceKind::CipherHandle);

        let mut request = handle.allocate_request().map_err(|fault| match fault {
            BackendFault::Exhausted => EngineError::OutOfMemory { fault: BackendFault::Exhausted },
            other => EngineError::CipherOpFailed { fault: other },
        })?;
        let _request_guard = self.ledger.acquire(ResourceKind::CipherRequest);

        let key = SessionKey::generate(&self.entropy);
        request
            .install_key(key.as_bytes())
            .map_err(|fault| EngineError::KeyRejected { fault })?;

        let iv: [u8; IV_SIZE] = self.entropy.byte_array();
        let _iv_guard = self.ledger.acquire(ResourceKind::IvBuffer);

        let block = first_block(payload);
        let _scratch_guard = self.ledger.acquire(ResourceKind::ScratchBuffer);

        let (gate, completer) = CompletionGate::channel();
        let _window = PendingWindow::open(&self.pending, gate.interrupter());

        let verdict = match request.submit(BlockOp::Encrypt, iv, block, completer) {
            Err(fault) => return Err(EngineError::CipherOpFailed { fault }),
            Ok(Submission::Completed(verdict)) => verdict,
            Ok(Submission::Pending) => {
                tracing::debug!(suite = %self.config.suite, "submission pending, waiting");
                match self.config.completion_timeout {
                    Some(timeout) => gate.wait_timeout(timeout)?,
                    None => gate.wait()?,
                }
            },
        };

        let ciphertext = verdict.map_err(|fault| EngineError::CipherOpFailed { fault })?;
        tracing::debug!(
            suite = %self.config.suite,
            payload_len = payload.len(),
            "block encrypted"
        );
        Ok(CipherOutput { iv, ciphertext })
    }
}

fn open_error(suite: CipherSuite, fault: BackendFault) -> EngineError {
    match fault {
        BackendFault::Exhausted => EngineError::OutOfMemory { fault: BackendFault::Exhausted },
        other => EngineError::AlgorithmUnavailable { algorithm: suite.to_string(), fault: other },
    }
}

/// Scratch block bound to the submission: the payload prefix, zero-padded.
fn first_block(payload: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    let taken = payload.len().min(BLOCK_SIZE);
    block[..taken].copy_from_slice(&payload[..taken]);
    block
}

/// Registers the pending-wait interrupter for the duration of a submission.
///
/// Dropping the window (any exit path) clears the registration, so a stale
/// interrupter can never outlive its invocation.
struct PendingWindow<'a> {
    pending: &'a PendingInterrupter,
}

impl<'a> PendingWindow<'a> {
    fn open(pending: &'a PendingInterrupter, interrupter: Interrupter<CipherVerdict>) -> Self {
        *lock_pending(pending) = Some(interrupter);
        Self { pending }
    }
}

impl Drop for PendingWindow<'_> {
    fn drop(&mut self) {
        lock_pending(self.pending).take();
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::{SoftwareCipherBackend, ThreadedCipherBackend};
    use crate::cipher::{KEY_SIZE, encrypt_block};

    use super::*;

    /// Deterministic entropy: every draw is 0, 1, 2, ...
    #[derive(Debug, Clone, Default)]
    struct PatternEntropy;

    impl EntropySource for PatternEntropy {
        fn fill_bytes(&self, buffer: &mut [u8]) {
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = i as u8;
            }
        }
    }

    fn pattern_key() -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    fn pattern_iv() -> [u8; IV_SIZE] {
        let mut iv = [0u8; IV_SIZE];
        for (i, byte) in iv.iter_mut().enumerate() {
            *byte = i as u8;
        }
        iv
    }

    #[test]
    fn output_matches_the_primitive_under_known_entropy() {
        let engine = CipherEngine::new(
            SoftwareCipherBackend,
            PatternEntropy,
            CipherConfig::default(),
            ResourceLedger::new(),
        );

        let output = engine.encrypt_oneshot(b"attack at dawn!!").unwrap();

        let expected =
            encrypt_block(&pattern_key(), &pattern_iv(), &first_block(b"attack at dawn!!"))
                .unwrap();
        assert_eq!(output.iv, pattern_iv());
        assert_eq!(output.ciphertext, expected);
    }

    #[test]
    fn pending_path_produces_the_same_output_as_the_synchronous_path() {
        let config = CipherConfig::default();
        let ledger = ResourceLedger::new();

        let sync_engine = CipherEngine::new(
            SoftwareCipherBackend,
            PatternEntropy,
            config.clone(),
            ledger.clone(),
        );
        let threaded_engine =
            CipherEngine::new(ThreadedCipherBackend, PatternEntropy, config, ledger);

        let sync_output = sync_engine.encrypt_oneshot(b"same either way").unwrap();
        let threaded_output = threaded_engine.encrypt_oneshot(b"same either way").unwrap();

        assert_eq!(sync_output, threaded_output);
    }

    #[test]
    fn short_payload_is_zero_padded() {
        let engine = CipherEngine::new(
            SoftwareCipherBackend,
            PatternEntropy,
            CipherConfig::default(),
            ResourceLedger::new(),
        );

        let output = engine.encrypt_oneshot(b"ab").unwrap();

        let mut padded = [0u8; BLOCK_SIZE];
        padded[..2].copy_from_slice(b"ab");
        let expected = encrypt_block(&pattern_key(), &pattern_iv(), &padded).unwrap();
        assert_eq!(output.ciphertext, expected);
    }

    #[test]
    fn bytes_beyond_the_first_block_are_ignored() {
        let engine = CipherEngine::new(
            SoftwareCipherBackend,
            PatternEntropy,
            CipherConfig::default(),
            ResourceLedger::new(),
        );

        let long = engine.encrypt_oneshot(b"0123456789abcdefEXTRA BYTES").unwrap();
        let exact = engine.encrypt_oneshot(b"0123456789abcdef").unwrap();

        assert_eq!(long, exact);
    }

    #[test]
    fn successful_invocation_releases_every_resource() {
        let ledger = ResourceLedger::new();
        let engine = CipherEngine::new(
            ThreadedCipherBackend,
            PatternEntropy,
            CipherConfig::default(),
            ledger.clone(),
        );

        engine.encrypt_oneshot(b"accounted").unwrap();

        assert_eq!(ledger.outstanding(), 0);
        assert_eq!(ledger.acquired_of(ResourceKind::CipherHandle), 1);
        assert_eq!(ledger.acquired_of(ResourceKind::CipherRequest), 1);
        assert_eq!(ledger.acquired_of(ResourceKind::IvBuffer), 1);
        assert_eq!(ledger.acquired_of(ResourceKind::ScratchBuffer), 1);
    }

    #[test]
    fn interrupt_with_no_pending_wait_reports_false() {
        let engine = CipherEngine::new(
            SoftwareCipherBackend,
            PatternEntropy,
            CipherConfig::default(),
            ResourceLedger::new(),
        );

        assert!(!engine.interrupt_handle().interrupt());
    }
}
