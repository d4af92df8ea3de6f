//! Device contract over the process-wide shared slot.
//!
//! A [`TransformDevice`] owns the single [`TransformSlot`] every caller
//! shares. Opening the device hands out a [`DeviceHandle`]; handles do not
//! isolate callers from each other. Slot access is serialized by a mutex,
//! which preserves the shared-slot semantics: the last completed write wins,
//! and a read drains whichever result is installed at that moment.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cryptoslot_crypto::{
    CipherBackend, CipherConfig, CipherEngine, DigestBackend, DigestEngine, DigestOutput,
    EntropySource, InterruptHandle, Md5Backend, OsEntropy, ResourceLedger, SoftwareCipherBackend,
};

use crate::error::DeviceError;
use crate::slot::{TransformMode, TransformSlot};

/// The process-wide transform device.
///
/// Cheap to clone; all clones share the same slot and open counter.
pub struct TransformDevice<D, C, E> {
    shared: Arc<DeviceShared<D, C, E>>,
}

struct DeviceShared<D, C, E> {
    slot: Mutex<TransformSlot<D, C, E>>,
    opens: AtomicU64,
    interrupt: InterruptHandle,
}

impl<D, C, E> TransformDevice<D, C, E>
where
    D: DigestBackend,
    C: CipherBackend,
    E: EntropySource,
{
    /// Wraps `slot` as the shared device.
    pub fn new(slot: TransformSlot<D, C, E>) -> Self {
        let interrupt = slot.interrupt_handle();
        Self {
            shared: Arc::new(DeviceShared {
                slot: Mutex::new(slot),
                opens: AtomicU64::new(0),
                interrupt,
            }),
        }
    }
}

impl<D, C, E> TransformDevice<D, C, E> {
    /// Opens the device and returns a handle to the shared slot.
    ///
    /// Every open increments the usage counter; closing never decrements it.
    pub fn open(&self) -> DeviceHandle<D, C, E> {
        let count = self.shared.opens.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(count, "device opened");
        DeviceHandle { shared: Arc::clone(&self.shared) }
    }

    /// How many times the device has been opened so far.
    #[must_use]
    pub fn opens(&self) -> u64 {
        self.shared.opens.load(Ordering::Relaxed)
    }

    /// Interrupts a pending cipher wait, if any, without taking the slot
    /// lock.
    ///
    /// Returns whether a waiter was pending.
    pub fn interrupt(&self) -> bool {
        self.shared.interrupt.interrupt()
    }
}

impl<D, C, E> Clone for TransformDevice<D, C, E> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

/// One opened view of the device.
///
/// Handles share the single slot; there is no per-handle state beyond the
/// open itself. Dropping a handle closes it.
pub struct DeviceHandle<D, C, E> {
    shared: Arc<DeviceShared<D, C, E>>,
}

impl<D, C, E> DeviceHandle<D, C, E>
where
    D: DigestBackend,
    C: CipherBackend,
    E: EntropySource,
{
    /// Writes `bytes` into the slot, running the mode's transform.
    ///
    /// Returns the number of payload bytes accepted.
    pub fn write(&self, bytes: &[u8]) -> Result<usize, DeviceError> {
        let mut slot = lock_slot(&self.shared.slot);
        let accepted = slot.write(bytes)?;
        Ok(accepted)
    }

    /// Drains the slot's readable result into `out`.
    ///
    /// Returns the number of bytes copied; zero when no result is ready.
    pub fn read(&self, out: &mut [u8]) -> Result<usize, DeviceError> {
        let mut slot = lock_slot(&self.shared.slot);
        Ok(slot.read(out))
    }

    /// Digest retained by the most recent successful digest-mode write.
    #[must_use]
    pub fn last_digest(&self) -> Option<DigestOutput> {
        lock_slot(&self.shared.slot).last_digest()
    }
}

impl<D, C, E> Drop for DeviceHandle<D, C, E> {
    fn drop(&mut self) {
        tracing::info!("device closed");
    }
}

// A poisoned slot mutex means a writer panicked mid-write; the slot state
// machine tolerates the leftover `Ingesting` state, so the lock is recovered
// rather than propagated.
fn lock_slot<D, C, E>(
    slot: &Mutex<TransformSlot<D, C, E>>,
) -> MutexGuard<'_, TransformSlot<D, C, E>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Device over the software backends and operating-system entropy.
pub type SoftwareDevice = TransformDevice<Md5Backend, SoftwareCipherBackend, OsEntropy>;

/// Builds the production device: software digest and cipher backends, OS
/// entropy, a fresh resource ledger.
#[must_use]
pub fn software_device(mode: TransformMode, config: CipherConfig) -> SoftwareDevice {
    let ledger = ResourceLedger::new();
    let digest = DigestEngine::new(Md5Backend, ledger.clone());
    let cipher = CipherEngine::new(SoftwareCipherBackend, OsEntropy, config, ledger);
    TransformDevice::new(TransformSlot::new(mode, digest, cipher))
}
