//! Deterministic entropy for reproducible scenarios.

use std::sync::{Arc, Mutex, PoisonError};

use cryptoslot_crypto::EntropySource;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Entropy over a seeded ChaCha stream.
///
/// Clones share the stream: every draw, from any clone, advances the same
/// sequence. A fresh instance built from the same seed replays the identical
/// sequence, which is what lets the reference model predict a device's key
/// and IV draws.
///
/// ChaCha8 rather than a full-strength variant: this stream only ever feeds
/// tests.
#[derive(Debug, Clone)]
pub struct SeededEntropy {
    stream: Arc<Mutex<ChaCha8Rng>>,
}

impl SeededEntropy {
    /// Entropy replaying the stream identified by `seed`.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self { stream: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))) }
    }
}

impl EntropySource for SeededEntropy {
    fn fill_bytes(&self, buffer: &mut [u8]) {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
