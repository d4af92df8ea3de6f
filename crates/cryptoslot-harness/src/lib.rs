//! Deterministic test harness for the cryptoslot transform device.
//!
//! Seeded entropy, a reference model, invariant checks and a scenario driver
//! for reproducible testing of the slot's observable behavior, including
//! cipher output that is normally randomized.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. Operations are applied to both the model and the real device,
//! and their observable results are compared after every step.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths,
//! not specific scenarios. Use [`InvariantRegistry::standard()`] for the
//! common slot invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod entropy;
pub mod invariants;
pub mod model;
pub mod scenario;

pub use entropy::SeededEntropy;
pub use invariants::{
    DeviceSnapshot, DrainBounded, Invariant, InvariantRegistry, InvariantResult, OpenMonotonicity,
    ResourceBalance, Violation,
};
pub use model::{SlotModel, annotated_echo};
pub use scenario::{
    Scenario, ScenarioDriver, SeededDevice, SeededHandle, SlotOp, SmallPayload, run_scenario,
    seeded_device,
};
