//! Tests for the device's transform contract.
//!
//! These tests verify critical invariants:
//! - Echo results are the accepted payload plus its rendered length
//! - Writes truncate at the mode's ingest cap, never beyond it
//! - A result is drained at most once; new writes replace unread results
//! - Digest-bytes results are the raw digest octets, sized to the digest
//! - The digest register tracks the last successful transform only
//! - Cipher results replay exactly from the entropy seed

use cryptoslot_core::{CAPACITY, ECHO_MAX_PAYLOAD, TransformMode};
use cryptoslot_crypto::{
    BLOCK_SIZE, DIGEST_SIZE, EntropySource, IV_SIZE, KEY_SIZE, encrypt_block,
};
use cryptoslot_harness::{SeededEntropy, annotated_echo, seeded_device};

/// INVARIANT: An echo result is the payload followed by " (N letters)" where
/// N is the count of payload bytes the write accepted.
#[test]
fn echo_result_is_payload_plus_annotation() {
    let (device, _ledger) = seeded_device(TransformMode::DigestEcho, 0);
    let handle = device.open();

    let accepted = handle.write(b"hello world").expect("write should succeed");
    assert_eq!(accepted, 11);

    let mut out = [0u8; CAPACITY];
    let drained = handle.read(&mut out).expect("read should succeed");
    assert_eq!(&out[..drained], b"hello world (11 letters)");
}

/// INVARIANT: The annotation fits even for the largest accepted payload; the
/// cap is chosen so annotation space always remains.
#[test]
fn echo_annotation_fits_at_the_payload_cap() {
    let (device, _ledger) = seeded_device(TransformMode::DigestEcho, 0);
    let handle = device.open();

    let payload = vec![b'x'; ECHO_MAX_PAYLOAD];
    let accepted = handle.write(&payload).expect("write at the cap should succeed");
    assert_eq!(accepted, ECHO_MAX_PAYLOAD);

    let mut out = [0u8; CAPACITY];
    let drained = handle.read(&mut out).expect("read should succeed");
    assert_eq!(&out[..drained], &annotated_echo(&payload)[..]);
    assert!(drained <= CAPACITY, "result must fit the slot buffer");
}

/// INVARIANT: Oversized writes are truncated to the mode's cap, and the
/// accepted count reports the truncation.
#[test]
fn writes_truncate_at_the_mode_cap() {
    let oversized = vec![b'z'; CAPACITY + 100];

    for (mode, cap) in [
        (TransformMode::DigestEcho, ECHO_MAX_PAYLOAD),
        (TransformMode::DigestBytes, CAPACITY),
        (TransformMode::CipherEncrypt, CAPACITY),
    ] {
        let (device, _ledger) = seeded_device(mode, 0);
        let handle = device.open();

        let accepted = handle.write(&oversized).expect("truncated write should succeed");
        assert_eq!(accepted, cap, "wrong cap for {mode}");
    }
}

/// INVARIANT: A read before any write drains nothing.
#[test]
fn reads_before_any_write_drain_nothing() {
    let (device, _ledger) = seeded_device(TransformMode::DigestEcho, 0);
    let handle = device.open();

    let mut out = [0u8; CAPACITY];
    assert_eq!(handle.read(&mut out).expect("read should succeed"), 0);
}

/// INVARIANT: A result is drained at most once; the second read of the same
/// result drains nothing.
#[test]
fn results_drain_at_most_once() {
    let (device, _ledger) = seeded_device(TransformMode::DigestEcho, 0);
    let handle = device.open();

    handle.write(b"once").expect("write should succeed");

    let mut out = [0u8; CAPACITY];
    assert!(handle.read(&mut out).expect("first read") > 0);
    assert_eq!(handle.read(&mut out).expect("second read"), 0);
}

/// INVARIANT: A write while a result is unread replaces the result; the old
/// result is never readable afterwards.
#[test]
fn new_writes_replace_unread_results() {
    let (device, _ledger) = seeded_device(TransformMode::DigestEcho, 0);
    let handle = device.open();

    handle.write(b"first").expect("first write");
    handle.write(b"second").expect("second write");

    let mut out = [0u8; CAPACITY];
    let drained = handle.read(&mut out).expect("read should succeed");
    assert_eq!(&out[..drained], b"second (6 letters)");
}

/// INVARIANT: A read smaller than the result drains a prefix and drops the
/// tail; the tail never reappears.
#[test]
fn partial_reads_drop_the_undrained_tail() {
    let (device, _ledger) = seeded_device(TransformMode::DigestEcho, 0);
    let handle = device.open();

    handle.write(b"0123456789").expect("write should succeed");

    let mut small = [0u8; 4];
    assert_eq!(handle.read(&mut small).expect("partial read"), 4);
    assert_eq!(&small, b"0123");

    let mut out = [0u8; CAPACITY];
    assert_eq!(handle.read(&mut out).expect("followup read"), 0);
}

/// INVARIANT: Digest-bytes results are the raw digest octets, exactly
/// [`DIGEST_SIZE`] of them, not a textual rendering.
#[test]
fn digest_bytes_results_are_raw_octets() {
    let (device, _ledger) = seeded_device(TransformMode::DigestBytes, 0);
    let handle = device.open();

    handle.write(b"abc").expect("write should succeed");

    let mut out = [0u8; CAPACITY];
    let drained = handle.read(&mut out).expect("read should succeed");
    assert_eq!(drained, DIGEST_SIZE);
    assert_eq!(
        out[..drained],
        hex::decode("900150983cd24fb0d6963f7d28e17f72").expect("valid hex")[..]
    );
}

/// INVARIANT: The digest register holds the digest of the last successfully
/// transformed payload; reads do not clear it.
#[test]
fn digest_register_tracks_the_last_successful_transform() {
    let (device, _ledger) = seeded_device(TransformMode::DigestEcho, 0);
    let handle = device.open();

    assert_eq!(handle.last_digest(), None, "fresh device has no digest");

    handle.write(b"abc").expect("first write");
    let first = handle.last_digest().expect("digest after write");
    assert_eq!(first.to_string(), "900150983cd24fb0d6963f7d28e17f72");

    let mut out = [0u8; CAPACITY];
    handle.read(&mut out).expect("read should succeed");
    assert_eq!(handle.last_digest(), Some(first), "reads must not clear the register");

    handle.write(b"other").expect("second write");
    assert_ne!(handle.last_digest(), Some(first), "new transforms must update the register");
}

/// INVARIANT: Cipher results are the IV followed by the ciphertext of the
/// zero-padded first payload block, and both replay from the entropy seed.
#[test]
fn cipher_results_replay_from_the_seed() {
    let seed = 31;
    let (device, _ledger) = seeded_device(TransformMode::CipherEncrypt, seed);
    let handle = device.open();

    handle.write(b"payload").expect("write should succeed");

    let mut out = [0u8; CAPACITY];
    let drained = handle.read(&mut out).expect("read should succeed");
    assert_eq!(drained, IV_SIZE + BLOCK_SIZE);

    // Replay the device's draws: key first, then IV.
    let replay = SeededEntropy::from_seed(seed);
    let key: [u8; KEY_SIZE] = replay.byte_array();
    let iv: [u8; IV_SIZE] = replay.byte_array();
    let mut block = [0u8; BLOCK_SIZE];
    block[..7].copy_from_slice(b"payload");
    let ciphertext = encrypt_block(&key, &iv, &block).expect("reference encrypt");

    assert_eq!(out[..IV_SIZE], iv);
    assert_eq!(out[IV_SIZE..drained], ciphertext);
}

/// INVARIANT: Consecutive cipher writes use fresh key and IV material, so
/// identical payloads produce different results.
#[test]
fn repeated_cipher_writes_never_reuse_material() {
    let (device, _ledger) = seeded_device(TransformMode::CipherEncrypt, 5);
    let handle = device.open();

    let mut results = Vec::new();
    for _ in 0..2 {
        handle.write(b"same payload").expect("write should succeed");
        let mut out = [0u8; CAPACITY];
        let drained = handle.read(&mut out).expect("read should succeed");
        results.push(out[..drained].to_vec());
    }

    assert_ne!(results[0], results[1], "fresh material per invocation");
    assert_ne!(results[0][..IV_SIZE], results[1][..IV_SIZE], "fresh IV per invocation");
}
