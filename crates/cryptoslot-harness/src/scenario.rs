//! Scenario driving for model-based slot testing.
//!
//! A scenario is a sequence of [`SlotOp`]s applied in lockstep to a real
//! device and a [`SlotModel`] built from the same seed. After every step the
//! driver compares the observable results and checks the standard
//! invariants, so any divergence is caught at the step that introduced it.

use arbitrary::Arbitrary;
use cryptoslot_core::{
    CAPACITY, DeviceHandle, ECHO_MAX_PAYLOAD, TransformDevice, TransformMode, TransformSlot,
};
use cryptoslot_crypto::{
    CipherConfig, CipherEngine, DigestEngine, Md5Backend, ResourceLedger, SoftwareCipherBackend,
};

use crate::entropy::SeededEntropy;
use crate::invariants::{DeviceSnapshot, InvariantRegistry};
use crate::model::SlotModel;

/// A transform device over software backends and seeded entropy.
pub type SeededDevice = TransformDevice<Md5Backend, SoftwareCipherBackend, SeededEntropy>;

/// Handle into a [`SeededDevice`].
pub type SeededHandle = DeviceHandle<Md5Backend, SoftwareCipherBackend, SeededEntropy>;

/// Builds a deterministic software device and the ledger observing it.
///
/// The device draws key and IV material from a stream seeded with `seed`, so
/// a [`SlotModel`] built from the same seed predicts its cipher output
/// exactly.
#[must_use]
pub fn seeded_device(mode: TransformMode, seed: u64) -> (SeededDevice, ResourceLedger) {
    let ledger = ResourceLedger::new();
    let digest = DigestEngine::new(Md5Backend, ledger.clone());
    let cipher = CipherEngine::new(
        SoftwareCipherBackend,
        SeededEntropy::from_seed(seed),
        CipherConfig::default(),
        ledger.clone(),
    );
    (TransformDevice::new(TransformSlot::new(mode, digest, cipher)), ledger)
}

/// Operations that can be applied to a transform slot.
///
/// Operations are small and composable so random exploration covers
/// interesting interleavings: writes that replace unread results, reads of
/// every size, and reopens that exercise the usage counter.
#[derive(Debug, Clone, Arbitrary)]
pub enum SlotOp {
    /// Write a payload into the slot.
    Write {
        /// Payload to write.
        payload: SmallPayload,
    },

    /// Read the slot's result into a buffer.
    Read {
        /// Caller buffer size in bytes.
        cap: u8,
    },

    /// Open a fresh handle, replacing the driver's current one.
    Reopen,
}

/// Compact payload description for generated writes.
///
/// The content is deterministic from the seed, and the size classes straddle
/// the interesting boundaries: empty, small, the echo payload cap, and
/// larger than the buffer itself.
#[derive(Debug, Clone, Arbitrary)]
pub struct SmallPayload {
    /// Payload seed (expanded to content deterministically).
    pub seed: u8,
    /// Payload length hint (0-3 maps to empty/small/cap/oversized).
    pub size_class: u8,
}

impl SmallPayload {
    /// Expand to actual payload bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = match self.size_class % 4 {
            0 => 0,
            1 => 9,
            2 => ECHO_MAX_PAYLOAD,
            _ => CAPACITY * 2,
        };

        (0..len).map(|i| self.seed.wrapping_add(i as u8)).collect()
    }
}

/// Applies operations to a device and its model in lockstep.
///
/// Holds one open handle at a time; [`SlotOp::Reopen`] replaces it, which
/// closes the previous handle and must not disturb the usage counter.
pub struct ScenarioDriver {
    device: SeededDevice,
    handle: SeededHandle,
    model: SlotModel,
    ledger: ResourceLedger,
    registry: InvariantRegistry,
    snapshot: DeviceSnapshot,
    expected_opens: u64,
}

impl ScenarioDriver {
    /// Driver over a fresh device and model sharing `seed`.
    #[must_use]
    pub fn new(mode: TransformMode, seed: u64) -> Self {
        let (device, ledger) = seeded_device(mode, seed);
        let handle = device.open();
        let mut snapshot = DeviceSnapshot::new();
        snapshot.record_opens(device.opens());

        Self {
            device,
            handle,
            model: SlotModel::new(mode, seed),
            ledger,
            registry: InvariantRegistry::standard(),
            snapshot,
            expected_opens: 1,
        }
    }

    /// Apply one operation to both device and model, panicking on any
    /// divergence or invariant violation.
    pub fn apply(&mut self, op: &SlotOp) {
        tracing::trace!(?op, "applying");
        match op {
            SlotOp::Write { payload } => {
                let bytes = payload.to_bytes();
                let expected = self.model.write(&bytes);
                match self.handle.write(&bytes) {
                    Ok(accepted) => {
                        assert_eq!(
                            accepted, expected,
                            "device and model disagree on accepted bytes"
                        );
                    },
                    Err(error) => panic!("write failed under software backends: {error}"),
                }
            },
            SlotOp::Read { cap } => {
                let cap = usize::from(*cap);
                let expected = self.model.read(cap);
                let mut out = vec![0_u8; cap];
                let drained = match self.handle.read(&mut out) {
                    Ok(drained) => drained,
                    Err(error) => panic!("read failed under software backends: {error}"),
                };
                assert_eq!(
                    out[..drained],
                    expected[..],
                    "device and model disagree on drained bytes"
                );
                self.snapshot.record_drain(drained);
            },
            SlotOp::Reopen => {
                self.handle = self.device.open();
                self.expected_opens += 1;
                assert_eq!(self.device.opens(), self.expected_opens, "open counter mismatch");
            },
        }

        self.snapshot.record_opens(self.device.opens());
        self.snapshot.set_outstanding(self.ledger.outstanding());
        self.registry.assert_all(&self.snapshot, "after step");
    }

    /// The device under test.
    #[must_use]
    pub fn device(&self) -> &SeededDevice {
        &self.device
    }

    /// The model's view of the slot.
    #[must_use]
    pub fn model(&self) -> &SlotModel {
        &self.model
    }
}

/// Run a full operation sequence against a fresh device.
pub fn run_scenario(mode: TransformMode, seed: u64, ops: &[SlotOp]) {
    let mut driver = ScenarioDriver::new(mode, seed);
    for op in ops {
        driver.apply(op);
    }
}

/// A complete generated scenario: mode, seed and operation sequence.
///
/// This is the entry point for coverage-guided exploration; everything the
/// scenario does is derived from generated bytes, so failures replay from
/// the input alone.
#[derive(Debug, Clone, Arbitrary)]
pub struct Scenario {
    mode_selector: u8,
    /// Seed for both the device entropy and the model replay.
    pub seed: u64,
    /// Operation sequence to apply.
    pub ops: Vec<SlotOp>,
}

impl Scenario {
    /// Scenario from raw parts.
    ///
    /// `mode_selector` picks the transform mode modulo the mode count, so
    /// any value is valid.
    #[must_use]
    pub fn new(mode_selector: u8, seed: u64, ops: Vec<SlotOp>) -> Self {
        Self { mode_selector, seed, ops }
    }

    /// The transform mode this scenario exercises.
    #[must_use]
    pub fn mode(&self) -> TransformMode {
        match self.mode_selector % 3 {
            0 => TransformMode::DigestEcho,
            1 => TransformMode::DigestBytes,
            _ => TransformMode::CipherEncrypt,
        }
    }

    /// Run the scenario to completion, panicking on divergence.
    pub fn run(&self) {
        run_scenario(self.mode(), self.seed, &self.ops);
    }
}
