//! Fuzz target for the single-slot message buffer
//!
//! Exercises every buffer operation in arbitrary order against its stated
//! invariants
//!
//! # Strategy
//!
//! - Both ingest caps: the echo payload cap and the full capacity
//! - Annotation after arbitrary content, including repeated annotation
//! - Drains into buffers from empty to oversized
//!
//! # Invariants
//!
//! - Ready count never exceeds capacity
//! - Ingest accepts exactly `min(len, cap, capacity)` bytes
//! - A refused annotation leaves the content untouched
//! - Drain returns `min(ready, out.len())` and always resets the buffer

#![no_main]

use arbitrary::Arbitrary;
use cryptoslot_core::{CAPACITY, ECHO_MAX_PAYLOAD, MessageBuffer};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum BufferOp {
    Ingest { data: Vec<u8>, echo_cap: bool },
    Annotate,
    Drain { cap: u16 },
    Replace { data: Vec<u8> },
    Clear,
}

fuzz_target!(|ops: Vec<BufferOp>| {
    let mut buffer = MessageBuffer::new();

    for op in ops {
        match op {
            BufferOp::Ingest { data, echo_cap } => {
                let cap = if echo_cap { ECHO_MAX_PAYLOAD } else { CAPACITY };
                let accepted = buffer.ingest(&data, cap);
                assert_eq!(accepted, data.len().min(cap));
                assert_eq!(buffer.ready_len(), accepted);
                assert_eq!(buffer.readable(), &data[..accepted]);
            }
            BufferOp::Annotate => {
                let before = buffer.readable().to_vec();
                match buffer.annotate() {
                    Ok(ready) => {
                        assert_eq!(buffer.ready_len(), ready);
                        assert!(buffer.readable().starts_with(&before));
                        assert!(buffer.readable().ends_with(b" letters)"));
                    }
                    Err(_) => assert_eq!(buffer.readable(), &before[..]),
                }
            }
            BufferOp::Drain { cap } => {
                let ready = buffer.ready_len();
                let mut out = vec![0u8; usize::from(cap)];
                let drained = buffer.drain(&mut out);
                assert_eq!(drained, ready.min(out.len()));
                assert_eq!(buffer.ready_len(), 0);
            }
            BufferOp::Replace { data } => {
                buffer.replace(&data);
                assert_eq!(buffer.ready_len(), data.len().min(CAPACITY));
            }
            BufferOp::Clear => {
                buffer.clear();
                assert_eq!(buffer.ready_len(), 0);
            }
        }

        assert!(buffer.ready_len() <= CAPACITY);
    }
});
