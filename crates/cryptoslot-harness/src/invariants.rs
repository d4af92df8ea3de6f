//! Invariant checking for slot scenarios.
//!
//! Invariants are properties that must hold after every scenario step,
//! regardless of the step sequence. The scenario driver extracts observable
//! state into a [`DeviceSnapshot`] and runs registered [`Invariant`] checks
//! against it. The snapshot carries history, not just the latest values, so
//! invariants can check monotonicity.

use std::fmt;

use cryptoslot_core::CAPACITY;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// Observable device state gathered by a scenario driver.
#[derive(Debug, Clone, Default)]
pub struct DeviceSnapshot {
    /// Outstanding engine resource guards at snapshot time.
    pub outstanding: u64,
    /// Open counter values in observation order.
    pub open_history: Vec<u64>,
    /// Byte count of every observed drain, in order.
    pub drain_history: Vec<usize>,
}

impl DeviceSnapshot {
    /// Empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the open counter after a step.
    pub fn record_opens(&mut self, opens: u64) {
        self.open_history.push(opens);
    }

    /// Record a drain's byte count.
    pub fn record_drain(&mut self, drained: usize) {
        self.drain_history.push(drained);
    }

    /// Set the outstanding guard count for this observation.
    pub fn set_outstanding(&mut self, outstanding: u64) {
        self.outstanding = outstanding;
    }
}

/// An invariant that can be checked against scenario state.
///
/// Invariants capture WHAT must be true after every step, not specific
/// scenarios.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against the current state.
    ///
    /// Returns `Ok(())` if the invariant holds, or a [`Violation`]
    /// describing what went wrong.
    fn check(&self, state: &DeviceSnapshot) -> InvariantResult;
}

/// Between operations, every engine resource guard must be released.
///
/// Engines acquire handles, request objects and buffers per invocation and
/// must release them on every exit path. A nonzero count between steps is a
/// leak.
pub struct ResourceBalance;

impl Invariant for ResourceBalance {
    fn name(&self) -> &'static str {
        "resource_balance"
    }

    fn check(&self, state: &DeviceSnapshot) -> InvariantResult {
        if state.outstanding != 0 {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "{} resource guards still outstanding between operations",
                    state.outstanding
                ),
            });
        }
        Ok(())
    }
}

/// The device open counter never decreases.
///
/// Closing a handle must not decrement the counter; a decrease indicates
/// counter corruption.
pub struct OpenMonotonicity;

impl Invariant for OpenMonotonicity {
    fn name(&self) -> &'static str {
        "open_monotonicity"
    }

    fn check(&self, state: &DeviceSnapshot) -> InvariantResult {
        for window in state.open_history.windows(2) {
            if window[1] < window[0] {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("open counter decreased {} → {}", window[0], window[1]),
                });
            }
        }
        Ok(())
    }
}

/// No drain ever exceeds the slot buffer capacity.
pub struct DrainBounded;

impl Invariant for DrainBounded {
    fn name(&self) -> &'static str {
        "drain_bounded"
    }

    fn check(&self, state: &DeviceSnapshot) -> InvariantResult {
        for (index, &drained) in state.drain_history.iter().enumerate() {
            if drained > CAPACITY {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "drain {index} returned {drained} bytes, capacity is {CAPACITY}"
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Registry of invariants to check.
///
/// Collects multiple invariants and runs them all against scenario state.
/// Use [`InvariantRegistry::standard()`] for the common slot invariants.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with the standard slot invariants.
    ///
    /// Includes:
    /// - [`ResourceBalance`]: no guard leaks between operations
    /// - [`OpenMonotonicity`]: the open counter never decreases
    /// - [`DrainBounded`]: drains never exceed the buffer capacity
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(ResourceBalance);
        registry.add(OpenMonotonicity);
        registry.add(DrainBounded);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, state: &DeviceSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking on violation.
    ///
    /// Use this in tests where you want immediate failure with context.
    pub fn assert_all(&self, state: &DeviceSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
