//! Cipher backend seam: a staged request lifecycle behind pluggable
//! transports.
//!
//! A backend hands out suite handles, a handle allocates request objects,
//! and a request is armed with key material before its single submission.
//! The submission either completes on the calling thread or goes pending, in
//! which case the provided [`Completer`] delivers the verdict from wherever
//! the backend finishes the work.

use std::thread;

use zeroize::Zeroizing;

use crate::cipher::{
    BLOCK_SIZE, BlockOp, CipherSuite, IV_SIZE, KEY_SIZE, decrypt_block, encrypt_block,
    key_width_fault,
};
use crate::error::BackendFault;
use crate::gate::Completer;

/// Outcome of one submitted block operation.
pub type CipherVerdict = Result<[u8; BLOCK_SIZE], BackendFault>;

/// How a submission was taken by the backend.
#[derive(Debug)]
pub enum Submission {
    /// The operation finished on the calling thread.
    Completed(CipherVerdict),
    /// The operation will complete through the registered completer.
    Pending,
}

/// Provider of cipher suites.
pub trait CipherBackend: Send + Sync + 'static {
    /// Handle type for an opened suite.
    type Handle: CipherHandle;

    /// Open a handle for `suite`.
    fn open(&self, suite: CipherSuite) -> Result<Self::Handle, BackendFault>;
}

/// An opened cipher suite that can allocate request objects.
pub trait CipherHandle {
    /// Request type produced by this handle.
    type Request: CipherRequest;

    /// Allocate a request object for one submission.
    fn allocate_request(&self) -> Result<Self::Request, BackendFault>;
}

/// A single-use cipher request.
pub trait CipherRequest {
    /// Install key material; the backend may reject it.
    fn install_key(&mut self, key: &[u8]) -> Result<(), BackendFault>;

    /// Submit the single block operation, consuming the request.
    ///
    /// The completer must be fired exactly when [`Submission::Pending`] is
    /// returned; on [`Submission::Completed`] it is dropped unfired and the
    /// gate is never consulted.
    fn submit(
        self,
        op: BlockOp,
        iv: [u8; IV_SIZE],
        block: [u8; BLOCK_SIZE],
        completer: Completer<CipherVerdict>,
    ) -> Result<Submission, BackendFault>;
}

/// Synchronous software backend; every submission completes on the calling
/// thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareCipherBackend;

impl CipherBackend for SoftwareCipherBackend {
    type Handle = SoftwareCipherHandle;

    fn open(&self, suite: CipherSuite) -> Result<SoftwareCipherHandle, BackendFault> {
        match suite {
            CipherSuite::Aes256Cbc => Ok(SoftwareCipherHandle { suite }),
        }
    }
}

/// Opened suite handle of the software backend.
#[derive(Debug)]
pub struct SoftwareCipherHandle {
    suite: CipherSuite,
}

impl CipherHandle for SoftwareCipherHandle {
    type Request = SoftwareCipherRequest;

    fn allocate_request(&self) -> Result<SoftwareCipherRequest, BackendFault> {
        tracing::trace!(suite = %self.suite, "software request allocated");
        Ok(SoftwareCipherRequest { key: None })
    }
}

/// Request object of the software backend.
pub struct SoftwareCipherRequest {
    key: Option<Zeroizing<Vec<u8>>>,
}

impl CipherRequest for SoftwareCipherRequest {
    fn install_key(&mut self, key: &[u8]) -> Result<(), BackendFault> {
        self.key = Some(validated_key(key)?);
        Ok(())
    }

    fn submit(
        self,
        op: BlockOp,
        iv: [u8; IV_SIZE],
        block: [u8; BLOCK_SIZE],
        _completer: Completer<CipherVerdict>,
    ) -> Result<Submission, BackendFault> {
        let key = self.key.ok_or_else(unkeyed_fault)?;
        Ok(Submission::Completed(run_block_op(op, &key, &iv, &block)))
    }
}

/// Backend that completes every submission from a spawned worker thread,
/// exercising the pending path end to end.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadedCipherBackend;

impl CipherBackend for ThreadedCipherBackend {
    type Handle = ThreadedCipherHandle;

    fn open(&self, suite: CipherSuite) -> Result<ThreadedCipherHandle, BackendFault> {
        match suite {
            CipherSuite::Aes256Cbc => Ok(ThreadedCipherHandle { suite }),
        }
    }
}

/// Opened suite handle of the threaded backend.
#[derive(Debug)]
pub struct ThreadedCipherHandle {
    suite: CipherSuite,
}

impl CipherHandle for ThreadedCipherHandle {
    type Request = ThreadedCipherRequest;

    fn allocate_request(&self) -> Result<ThreadedCipherRequest, BackendFault> {
        tracing::trace!(suite = %self.suite, "threaded request allocated");
        Ok(ThreadedCipherRequest { key: None })
    }
}

/// Request object of the threaded backend.
pub struct ThreadedCipherRequest {
    key: Option<Zeroizing<Vec<u8>>>,
}

impl CipherRequest for ThreadedCipherRequest {
    fn install_key(&mut self, key: &[u8]) -> Result<(), BackendFault> {
        self.key = Some(validated_key(key)?);
        Ok(())
    }

    fn submit(
        self,
        op: BlockOp,
        iv: [u8; IV_SIZE],
        block: [u8; BLOCK_SIZE],
        completer: Completer<CipherVerdict>,
    ) -> Result<Submission, BackendFault> {
        let key = self.key.ok_or_else(unkeyed_fault)?;
        let worker = thread::Builder::new()
            .name("cipher-completion".to_string())
            .spawn(move || completer.complete(run_block_op(op, &key, &iv, &block)))
            .map_err(|err| BackendFault::Failed {
                reason: format!("completion thread: {err}"),
            })?;
        // The completion outlives this call; the worker is detached.
        drop(worker);
        Ok(Submission::Pending)
    }
}

fn validated_key(key: &[u8]) -> Result<Zeroizing<Vec<u8>>, BackendFault> {
    if key.len() != KEY_SIZE {
        return Err(key_width_fault(key.len()));
    }
    Ok(Zeroizing::new(key.to_vec()))
}

fn unkeyed_fault() -> BackendFault {
    BackendFault::Failed { reason: "submission without installed key".to_string() }
}

fn run_block_op(
    op: BlockOp,
    key: &[u8],
    iv: &[u8; IV_SIZE],
    block: &[u8; BLOCK_SIZE],
) -> CipherVerdict {
    match op {
        BlockOp::Encrypt => encrypt_block(key, iv, block),
        BlockOp::Decrypt => decrypt_block(key, iv, block),
    }
}

#[cfg(test)]
mod tests {
    use crate::gate::CompletionGate;

    use super::*;

    const KEY: [u8; KEY_SIZE] = [0x11; KEY_SIZE];
    const IV: [u8; IV_SIZE] = [0x22; IV_SIZE];
    const BLOCK: [u8; BLOCK_SIZE] = [0x33; BLOCK_SIZE];

    #[test]
    fn software_backend_completes_synchronously() {
        let handle = SoftwareCipherBackend.open(CipherSuite::Aes256Cbc).unwrap();
        let mut request = handle.allocate_request().unwrap();
        request.install_key(&KEY).unwrap();

        let (_gate, completer) = CompletionGate::channel();
        let submission = request.submit(BlockOp::Encrypt, IV, BLOCK, completer).unwrap();

        let expected = encrypt_block(&KEY, &IV, &BLOCK).unwrap();
        match submission {
            Submission::Completed(verdict) => assert_eq!(verdict.unwrap(), expected),
            Submission::Pending => unreachable!("software backend never goes pending"),
        }
    }

    #[test]
    fn threaded_backend_goes_pending_and_signals_the_gate() {
        let handle = ThreadedCipherBackend.open(CipherSuite::Aes256Cbc).unwrap();
        let mut request = handle.allocate_request().unwrap();
        request.install_key(&KEY).unwrap();

        let (gate, completer) = CompletionGate::channel();
        let submission = request.submit(BlockOp::Encrypt, IV, BLOCK, completer).unwrap();
        assert!(matches!(submission, Submission::Pending));

        let verdict = gate.wait().unwrap();
        assert_eq!(verdict.unwrap(), encrypt_block(&KEY, &IV, &BLOCK).unwrap());
    }

    #[test]
    fn pending_and_synchronous_paths_agree() {
        let sync_handle = SoftwareCipherBackend.open(CipherSuite::Aes256Cbc).unwrap();
        let mut sync_request = sync_handle.allocate_request().unwrap();
        sync_request.install_key(&KEY).unwrap();
        let (_gate, completer) = CompletionGate::channel();
        let Submission::Completed(sync_verdict) =
            sync_request.submit(BlockOp::Encrypt, IV, BLOCK, completer).unwrap()
        else {
            unreachable!("software backend never goes pending");
        };

        let threaded_handle = ThreadedCipherBackend.open(CipherSuite::Aes256Cbc).unwrap();
        let mut threaded_request = threaded_handle.allocate_request().unwrap();
        threaded_request.install_key(&KEY).unwrap();
        let (gate, completer) = CompletionGate::channel();
        threaded_request.submit(BlockOp::Encrypt, IV, BLOCK, completer).unwrap();

        assert_eq!(gate.wait().unwrap().unwrap(), sync_verdict.unwrap());
    }

    #[test]
    fn narrow_key_is_rejected_at_installation() {
        let handle = SoftwareCipherBackend.open(CipherSuite::Aes256Cbc).unwrap();
        let mut request = handle.allocate_request().unwrap();

        let result = request.install_key(&[0u8; 16]);
        assert!(matches!(result, Err(BackendFault::KeyRejected { .. })));
    }

    #[test]
    fn submission_without_key_faults() {
        let handle = SoftwareCipherBackend.open(CipherSuite::Aes256Cbc).unwrap();
        let request = handle.allocate_request().unwrap();

        let (_gate, completer) = CompletionGate::channel();
        let result = request.submit(BlockOp::Encrypt, IV, BLOCK, completer);
        assert!(matches!(result, Err(BackendFault::Failed { .. })));
    }

    #[test]
    fn decrypt_submission_inverts_encrypt_submission() {
        let handle = SoftwareCipherBackend.open(CipherSuite::Aes256Cbc).unwrap();

        let mut encrypt = handle.allocate_request().unwrap();
        encrypt.install_key(&KEY).unwrap();
        let (_gate, completer) = CompletionGate::channel();
        let Submission::Completed(Ok(ciphertext)) =
            encrypt.submit(BlockOp::Encrypt, IV, BLOCK, completer).unwrap()
        else {
            unreachable!("synchronous encrypt must complete");
        };

        let mut decrypt = handle.allocate_request().unwrap();
        decrypt.install_key(&KEY).unwrap();
        let (_gate, completer) = CompletionGate::channel();
        let Submission::Completed(Ok(plaintext)) =
            decrypt.submit(BlockOp::Decrypt, IV, ciphertext, completer).unwrap()
        else {
            unreachable!("synchronous decrypt must complete");
        };

        assert_eq!(plaintext, BLOCK);
    }
}
