//! Fuzz target for whole slot scenarios
//!
//! Drives a real device and the reference model in lockstep from generated
//! bytes (HIGH priority)
//!
//! # Strategy
//!
//! - Mode coverage: the selector byte reaches echo, digest-bytes and cipher
//! - Operation soup: writes of boundary-straddling sizes, reads of every
//!   cap, handle reopens
//! - Seeded entropy: cipher output is compared byte for byte, not skipped
//!
//! # Invariants
//!
//! - Device and model agree on accepted and drained bytes after every step
//! - No engine resource guards outstanding between operations
//! - Open counter never decreases; drains never exceed the buffer capacity

#![no_main]

use cryptoslot_harness::Scenario;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|scenario: Scenario| {
    scenario.run();
});
