//! Resource accounting for engine invocations.
//!
//! Every handle, state object, and buffer an engine acquires is paired with a
//! [`ResourceGuard`] that releases it on drop. The ledger keeps per-kind
//! acquire/release tallies, so tests can assert that an invocation leaked
//! nothing, whichever exit path it took.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Kinds of resources an engine invocation can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Digest algorithm handle.
    DigestHandle,
    /// Per-invocation digest state.
    DigestState,
    /// Cipher suite handle.
    CipherHandle,
    /// Cipher request object.
    CipherRequest,
    /// Per-submission IV buffer.
    IvBuffer,
    /// In-place scratch block.
    ScratchBuffer,
}

impl ResourceKind {
    /// Every kind, in ledger index order.
    pub const ALL: [Self; 6] = [
        Self::DigestHandle,
        Self::DigestState,
        Self::CipherHandle,
        Self::CipherRequest,
        Self::IvBuffer,
        Self::ScratchBuffer,
    ];

    fn index(self) -> usize {
        match self {
            Self::DigestHandle => 0,
            Self::DigestState => 1,
            Self::CipherHandle => 2,
            Self::CipherRequest => 3,
            Self::IvBuffer => 4,
            Self::ScratchBuffer => 5,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DigestHandle => "digest-handle",
            Self::DigestState => "digest-state",
            Self::CipherHandle => "cipher-handle",
            Self::CipherRequest => "cipher-request",
            Self::IvBuffer => "iv-buffer",
            Self::ScratchBuffer => "scratch-buffer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct Tallies {
    acquired: [AtomicU64; ResourceKind::ALL.len()],
    released: [AtomicU64; ResourceKind::ALL.len()],
}

/// Shared acquire/release tallies for engine resources.
///
/// Cloning is cheap; clones observe the same tallies. The ledger never blocks
/// and never fails - it only counts.
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    tallies: Arc<Tallies>,
}

impl ResourceLedger {
    /// Fresh ledger with zero outstanding resources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an acquisition and return the guard that releases it.
    pub fn acquire(&self, kind: ResourceKind) -> ResourceGuard {
        self.tallies.acquired[kind.index()].fetch_add(1, Ordering::Relaxed);
        ResourceGuard { ledger: self.clone(), kind }
    }

    /// Resources currently held, across all kinds.
    pub fn outstanding(&self) -> u64 {
        ResourceKind::ALL.iter().map(|kind| self.outstanding_of(*kind)).sum()
    }

    /// Resources currently held of one kind.
    pub fn outstanding_of(&self, kind: ResourceKind) -> u64 {
        let acquired = self.tallies.acquired[kind.index()].load(Ordering::Relaxed);
        let released = self.tallies.released[kind.index()].load(Ordering::Relaxed);
        acquired.saturating_sub(released)
    }

    /// Total acquisitions of one kind over the ledger's lifetime.
    ///
    /// Lets tests assert how far an invocation got before failing.
    pub fn acquired_of(&self, kind: ResourceKind) -> u64 {
        self.tallies.acquired[kind.index()].load(Ordering::Relaxed)
    }

    fn release(&self, kind: ResourceKind) {
        self.tallies.released[kind.index()].fetch_add(1, Ordering::Relaxed);
    }
}

/// Releases one acquired resource when dropped.
#[derive(Debug)]
pub struct ResourceGuard {
    ledger: ResourceLedger,
    kind: ResourceKind,
}

impl ResourceGuard {
    /// The kind this guard releases.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.ledger.release(self.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ledger_has_nothing_outstanding() {
        let ledger = ResourceLedger::new();
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn acquire_then_drop_balances() {
        let ledger = ResourceLedger::new();

        let guard = ledger.acquire(ResourceKind::CipherHandle);
        assert_eq!(guard.kind(), ResourceKind::CipherHandle);
        assert_eq!(ledger.outstanding(), 1);
        assert_eq!(ledger.outstanding_of(ResourceKind::CipherHandle), 1);

        drop(guard);
        assert_eq!(ledger.outstanding(), 0);
        assert_eq!(ledger.acquired_of(ResourceKind::CipherHandle), 1);
    }

    #[test]
    fn kinds_are_tracked_independently() {
        let ledger = ResourceLedger::new();

        let _handle = ledger.acquire(ResourceKind::DigestHandle);
        let _state = ledger.acquire(ResourceKind::DigestState);

        assert_eq!(ledger.outstanding_of(ResourceKind::DigestHandle), 1);
        assert_eq!(ledger.outstanding_of(ResourceKind::DigestState), 1);
        assert_eq!(ledger.outstanding_of(ResourceKind::IvBuffer), 0);
        assert_eq!(ledger.outstanding(), 2);
    }

    #[test]
    fn clones_observe_the_same_tallies() {
        let ledger = ResourceLedger::new();
        let observer = ledger.clone();

        let guard = ledger.acquire(ResourceKind::ScratchBuffer);
        assert_eq!(observer.outstanding(), 1);

        drop(guard);
        assert_eq!(observer.outstanding(), 0);
    }

    #[test]
    fn drop_order_does_not_matter() {
        let ledger = ResourceLedger::new();

        let first = ledger.acquire(ResourceKind::CipherRequest);
        let second = ledger.acquire(ResourceKind::CipherRequest);
        assert_eq!(ledger.outstanding_of(ResourceKind::CipherRequest), 2);

        drop(first);
        assert_eq!(ledger.outstanding_of(ResourceKind::CipherRequest), 1);
        drop(second);
        assert_eq!(ledger.outstanding_of(ResourceKind::CipherRequest), 0);
    }

    #[test]
    fn display_names_are_stable() {
        assert_eq!(ResourceKind::DigestHandle.to_string(), "digest-handle");
        assert_eq!(ResourceKind::ScratchBuffer.to_string(), "scratch-buffer");
    }
}
