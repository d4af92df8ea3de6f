//! Reference model of the transform slot.
//!
//! The model predicts exactly what the real device must do: how many bytes a
//! write accepts, and which bytes the next read drains. Operations are
//! applied to both the model and the device, and the observable results are
//! compared.
//!
//! Cipher-mode predictions work because entropy is injectable: the model
//! replays the device's key and IV draws from an identically-seeded stream
//! and runs the one public block primitive over them.

use cryptoslot_core::TransformMode;
use cryptoslot_crypto::{BLOCK_SIZE, EntropySource, IV_SIZE, KEY_SIZE, encrypt_block};
use md5::{Digest, Md5};

use crate::entropy::SeededEntropy;

/// Reference rendering of the echo annotation.
#[must_use]
pub fn annotated_echo(payload: &[u8]) -> Vec<u8> {
    let mut rendered = payload.to_vec();
    rendered.extend_from_slice(format!(" ({} letters)", payload.len()).as_bytes());
    rendered
}

/// Predicts the observable behavior of a transform slot.
pub struct SlotModel {
    mode: TransformMode,
    entropy: SeededEntropy,
    readable: Vec<u8>,
}

impl SlotModel {
    /// Model of a slot in `mode` whose device draws entropy from `seed`.
    #[must_use]
    pub fn new(mode: TransformMode, seed: u64) -> Self {
        Self { mode, entropy: SeededEntropy::from_seed(seed), readable: Vec::new() }
    }

    /// Applies a write, returning the count of payload bytes the device must
    /// accept.
    ///
    /// Any unread result is replaced, mirroring the slot's discard-on-write
    /// behavior.
    pub fn write(&mut self, raw: &[u8]) -> usize {
        let accepted = raw.len().min(self.mode.ingest_cap());
        let payload = &raw[..accepted];
        self.readable = match self.mode {
            TransformMode::DigestEcho => annotated_echo(payload),
            TransformMode::DigestBytes => Md5::digest(payload).to_vec(),
            TransformMode::CipherEncrypt => {
                let key: [u8; KEY_SIZE] = self.entropy.byte_array();
                let iv: [u8; IV_SIZE] = self.entropy.byte_array();
                let mut block = [0_u8; BLOCK_SIZE];
                let take = payload.len().min(BLOCK_SIZE);
                block[..take].copy_from_slice(&payload[..take]);
                match encrypt_block(&key, &iv, &block) {
                    Ok(ciphertext) => {
                        let mut readable = iv.to_vec();
                        readable.extend_from_slice(&ciphertext);
                        readable
                    },
                    Err(fault) => panic!("model cipher rejected its own key: {fault}"),
                }
            },
        };
        accepted
    }

    /// Applies a read into a buffer of `cap` bytes, returning the bytes the
    /// device must drain.
    ///
    /// Consumes the outstanding result even when `cap` is too small to hold
    /// all of it; the undrained tail is dropped, as the buffer drops it.
    pub fn read(&mut self, cap: usize) -> Vec<u8> {
        let take = self.readable.len().min(cap);
        let drained = self.readable[..take].to_vec();
        self.readable.clear();
        drained
    }

    /// Whether a result is waiting to be drained.
    #[must_use]
    pub fn has_result(&self) -> bool {
        !self.readable.is_empty()
    }

    /// The mode this model predicts for.
    #[must_use]
    pub fn mode(&self) -> TransformMode {
        self.mode
    }
}
