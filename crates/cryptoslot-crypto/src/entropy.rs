//! Entropy seam for key and IV generation.
//!
//! Engines never reach for a global RNG: they draw bytes through an injected
//! [`EntropySource`], so production uses the operating-system RNG while tests
//! substitute a seeded source and pin every generated key and IV.

use rand::RngCore;
use rand::rngs::OsRng;

/// Source of random bytes for key and IV material.
///
/// # Invariants
///
/// - Production implementations draw from a cryptographically secure RNG
/// - Seeded implementations produce the same byte sequence for the same seed
pub trait EntropySource: Clone + Send + Sync + 'static {
    /// Fill `buffer` with random bytes.
    fn fill_bytes(&self, buffer: &mut [u8]);

    /// Draw a fixed-size array of random bytes.
    fn byte_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.fill_bytes(&mut bytes);
        bytes
    }
}

/// Operating-system entropy, the production source.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill_bytes(&self, buffer: &mut [u8]) {
        OsRng.fill_bytes(buffer);
    }
}
