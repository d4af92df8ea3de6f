//! Fuzz target for the cipher engine's oneshot invocation
//!
//! Checks the staged invocation against the block primitive and its inverse
//!
//! # Strategy
//!
//! - Arbitrary payloads: empty, sub-block, block-aligned, oversized
//! - Seeded entropy so key and IV draws can be replayed exactly
//!
//! # Invariants
//!
//! - The output IV is the engine's second entropy draw
//! - The ciphertext matches the primitive over the zero-padded first block
//! - Decrypting with the replayed key recovers that block bit-exactly
//! - Every invocation releases all of its resource guards

#![no_main]

use arbitrary::Arbitrary;
use cryptoslot_crypto::{
    BLOCK_SIZE, CipherConfig, CipherEngine, EntropySource, IV_SIZE, KEY_SIZE, ResourceLedger,
    SoftwareCipherBackend, decrypt_block, encrypt_block,
};
use cryptoslot_harness::SeededEntropy;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct OneshotInput {
    seed: u64,
    payload: Vec<u8>,
}

fuzz_target!(|input: OneshotInput| {
    let ledger = ResourceLedger::new();
    let engine = CipherEngine::new(
        SoftwareCipherBackend,
        SeededEntropy::from_seed(input.seed),
        CipherConfig::default(),
        ledger.clone(),
    );

    let output = engine.encrypt_oneshot(&input.payload).expect("software backend never fails");
    assert_eq!(ledger.outstanding(), 0);

    // Replay the engine's draws: key first, then IV.
    let replay = SeededEntropy::from_seed(input.seed);
    let key: [u8; KEY_SIZE] = replay.byte_array();
    let iv: [u8; IV_SIZE] = replay.byte_array();
    assert_eq!(output.iv, iv);

    let mut block = [0u8; BLOCK_SIZE];
    let taken = input.payload.len().min(BLOCK_SIZE);
    block[..taken].copy_from_slice(&input.payload[..taken]);

    let reference = encrypt_block(&key, &iv, &block).expect("reference encrypt");
    assert_eq!(output.ciphertext, reference);

    let recovered = decrypt_block(&key, &iv, &output.ciphertext).expect("reference decrypt");
    assert_eq!(recovered, block);
});
