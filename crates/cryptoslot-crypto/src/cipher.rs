//! AES-256-CBC single-block primitives and key material.
//!
//! The cipher path of the device transforms exactly one block per
//! invocation: the scratch block is encrypted in place under a fresh key and
//! IV. The functions here are pure; backends and the engine layer staging,
//! completion, and accounting on top.

use std::fmt;

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, generic_array::GenericArray};
use zeroize::Zeroize;

use crate::entropy::EntropySource;
use crate::error::BackendFault;

/// AES-256 key width in bytes.
pub const KEY_SIZE: usize = 32;

/// CBC initialization vector width in bytes.
pub const IV_SIZE: usize = 16;

/// AES block width in bytes.
pub const BLOCK_SIZE: usize = 16;

type Aes256CbcEncryptor = cbc::Encryptor<Aes256>;
type Aes256CbcDecryptor = cbc::Decryptor<Aes256>;

/// Symmetric suites the cipher path can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuite {
    /// AES-256 in CBC mode, the device's fixed choice.
    Aes256Cbc,
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aes256Cbc => f.write_str("aes256-cbc"),
        }
    }
}

/// Direction of a single-block operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOp {
    /// Transform plaintext into ciphertext.
    Encrypt,
    /// Invert a previous encryption.
    Decrypt,
}

/// One-shot 256-bit session key.
///
/// Generated fresh for every cipher invocation and zeroized on drop. There
/// is deliberately no `Clone`: the key exists in one place, gets installed
/// into one request, and dies with the invocation.
pub struct SessionKey {
    bytes: [u8; KEY_SIZE],
}

impl SessionKey {
    /// Generate a fresh key from `entropy`.
    pub fn generate<E: EntropySource>(entropy: &E) -> Self {
        Self { bytes: entropy.byte_array() }
    }

    /// Key from fixed bytes, for test vectors.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Result of one encrypting invocation: the IV used and the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherOutput {
    /// IV the block was chained against.
    pub iv: [u8; IV_SIZE],
    /// The transformed block.
    pub ciphertext: [u8; BLOCK_SIZE],
}

impl CipherOutput {
    /// Readable payload: IV followed by ciphertext.
    ///
    /// The IV travels with the result because the key does not survive the
    /// invocation; without the IV the ciphertext could never be inverted.
    pub fn to_bytes(&self) -> [u8; IV_SIZE + BLOCK_SIZE] {
        let mut bytes = [0u8; IV_SIZE + BLOCK_SIZE];
        bytes[..IV_SIZE].copy_from_slice(&self.iv);
        bytes[IV_SIZE..].copy_from_slice(&self.ciphertext);
        bytes
    }
}

/// Encrypt one block with AES-256-CBC.
///
/// Key material of the wrong width is rejected, never padded or truncated.
pub fn encrypt_block(
    key: &[u8],
    iv: &[u8; IV_SIZE],
    plaintext: &[u8; BLOCK_SIZE],
) -> Result<[u8; BLOCK_SIZE], BackendFault> {
    let mut encryptor =
        Aes256CbcEncryptor::new_from_slices(key, iv).map_err(|_| key_width_fault(key.len()))?;
    let mut block = GenericArray::clone_from_slice(plaintext);
    encryptor.encrypt_block_mut(&mut block);
    Ok(block.into())
}

/// Invert one block with AES-256-CBC.
pub fn decrypt_block(
    key: &[u8],
    iv: &[u8; IV_SIZE],
    ciphertext: &[u8; BLOCK_SIZE],
) -> Result<[u8; BLOCK_SIZE], BackendFault> {
    let mut decryptor =
        Aes256CbcDecryptor::new_from_slices(key, iv).map_err(|_| key_width_fault(key.len()))?;
    let mut block = GenericArray::clone_from_slice(ciphertext);
    decryptor.decrypt_block_mut(&mut block);
    Ok(block.into())
}

pub(crate) fn key_width_fault(got: usize) -> BackendFault {
    BackendFault::KeyRejected {
        reason: format!("AES-256 requires a {KEY_SIZE}-byte key, got {got}"),
    }
}
