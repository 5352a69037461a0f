//! Signals: a manual-reset flag operations can block on.
//!
//! A signal is the minimal resource an operation can wait for besides another
//! operation. Under systematic testing a wait is a forced `Wait` decision and
//! the waiter stays blocked in the registry until some operation sets the
//! signal, which is what lets the scheduler report deadlocks instead of
//! hanging. Outside a controlled operation it behaves like a condition
//! variable.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::runtime::context;
use crate::types::SignalId;

struct SignalState {
    id: SignalId,
    set: Mutex<bool>,
    changed: Condvar,
}

/// Manual-reset signal shared between operations.
#[derive(Clone)]
pub struct Signal {
    state: Arc<SignalState>,
}

impl Signal {
    /// Create an unset signal.
    pub fn new() -> Self {
        Self {
            state: Arc::new(SignalState {
                id: SignalId::next(),
                set: Mutex::new(false),
                changed: Condvar::new(),
            }),
        }
    }

    /// Identifier used in block reasons.
    pub fn id(&self) -> SignalId {
        self.state.id
    }

    /// Whether the signal is set.
    pub fn is_set(&self) -> bool {
        *self.state.set.lock()
    }

    /// Set the signal and release every waiter. Not a scheduling point.
    pub fn set(&self) {
        *self.state.set.lock() = true;
        self.state.changed.notify_all();
        if let Some(ctx) = context::systematic() {
            ctx.runtime.notify_signal(self.state.id);
        }
    }

    /// Clear the signal.
    pub fn reset(&self) {
        *self.state.set.lock() = false;
    }

    /// Block until the signal is set.
    pub fn wait(&self) {
        match context::systematic() {
            Some(ctx) => {
                while !self.is_set() {
                    ctx.runtime.wait_signal(ctx.operation, self.state.id);
                }
            }
            None => {
                let mut set = self.state.set.lock();
                while !*set {
                    self.state.changed.wait(&mut set);
                }
            }
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.state.id)
            .field("set", &self.is_set())
            .finish()
    }
}
