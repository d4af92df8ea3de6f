//! One-shot completion gate for asynchronously-submitted operations.
//!
//! A submission that cannot finish synchronously hands a [`Completer`] to the
//! backend and leaves the caller blocked on the [`CompletionGate`]. The
//! backend's completion callback becomes a single-shot signal into a channel;
//! the waiting thread observes exactly one outcome: the signal, an
//! interruption, or (when bounded) a timeout.
//!
//! The gate starts armed and is consumed by the wait, so a signaled gate can
//! never be reused or waited on twice.

use std::sync::mpsc;
use std::time::Duration;

use thiserror::Error;

/// Why a wait on a [`CompletionGate`] ended without the signal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// An [`Interrupter`] fired before the completion signal arrived.
    #[error("wait interrupted before completion")]
    Interrupted,

    /// The bounded wait elapsed with no signal.
    #[error("no completion within {waited:?}")]
    TimedOut {
        /// How long the caller waited.
        waited: Duration,
    },

    /// The signaling side dropped its [`Completer`] without firing it.
    #[error("completer dropped without signaling")]
    Abandoned,
}

enum Message<T> {
    Signal(T),
    Interrupt,
    Abandoned,
}

/// Waiting side of a one-shot completion channel.
///
/// The first message to arrive decides the outcome of the single wait.
/// Senders never block, so a completion fired after the waiter gave up is
/// silently discarded rather than wedging the backend.
pub struct CompletionGate<T> {
    receiver: mpsc::Receiver<Message<T>>,
    sender: mpsc::Sender<Message<T>>,
}

/// Signaling side of a one-shot completion channel.
///
/// Firing consumes the completer, so the outcome is delivered at most once.
/// Dropping an unfired completer reports [`WaitError::Abandoned`] to the
/// waiting side instead of leaving it blocked forever.
pub struct Completer<T> {
    sender: Option<mpsc::Sender<Message<T>>>,
}

/// Handle that interrupts a pending wait from another thread.
///
/// Cloneable; any clone can fire. Interrupting a gate whose signal already
/// arrived is a no-op - the queued signal wins.
#[derive(Clone)]
pub struct Interrupter<T> {
    sender: mpsc::Sender<Message<T>>,
}

impl<T> CompletionGate<T> {
    /// Create an armed gate and the completer that will signal it.
    pub fn channel() -> (Self, Completer<T>) {
        let (sender, receiver) = mpsc::channel();
        let gate = Self { receiver, sender: sender.clone() };
        (gate, Completer { sender: Some(sender) })
    }

    /// Handle for interrupting the wait from another thread.
    pub fn interrupter(&self) -> Interrupter<T> {
        Interrupter { sender: self.sender.clone() }
    }

    /// Block until the gate is signaled, interrupted, or abandoned.
    ///
    /// Unbounded: if the completer is withheld and never interrupted, this
    /// blocks forever. Callers who care use
    /// [`wait_timeout`](Self::wait_timeout).
    pub fn wait(self) -> Result<T, WaitError> {
        match self.receiver.recv() {
            Ok(message) => Self::resolve(message),
            // All senders gone without a message; the completer normally
            // reports its own abandonment first.
            Err(mpsc::RecvError) => Err(WaitError::Abandoned),
        }
    }

    /// Block until the gate resolves or `timeout` elapses.
    pub fn wait_timeout(self, timeout: Duration) -> Result<T, WaitError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => Self::resolve(message),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(WaitError::TimedOut { waited: timeout }),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(WaitError::Abandoned),
        }
    }

    fn resolve(message: Message<T>) -> Result<T, WaitError> {
        match message {
            Message::Signal(value) => Ok(value),
            Message::Interrupt => Err(WaitError::Interrupted),
            Message::Abandoned => Err(WaitError::Abandoned),
        }
    }
}

impl<T> Completer<T> {
    /// Deliver the outcome, consuming the completer.
    ///
    /// Delivery to a waiter that already gave up is discarded.
    pub fn complete(mut self, value: T) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Message::Signal(value));
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Message::Abandoned);
        }
    }
}

impl<T> Interrupter<T> {
    /// Request interruption of the pending wait.
    ///
    /// Returns `false` when the gate is already gone.
    pub fn interrupt(&self) -> bool {
        self.sender.send(Message::Interrupt).is_ok()
    }
}
