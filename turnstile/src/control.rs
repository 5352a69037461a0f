//! Execution control: binds controlled operations to real threads.
//!
//! Every operation parks on its own condition variable until it holds the
//! turn. The turn token lives behind a single mutex, so handing it over is a
//! release/acquire pair: everything the previous holder wrote is visible to
//! the next one. Only the holder of the turn runs application code.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::types::OperationId;

/// Why a thread could not obtain the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlError {
    /// The iteration was aborted; the caller must unwind.
    Aborted,
    /// The operation has no wait handle (never bound, or already completed).
    Unbound(OperationId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlPhase {
    Running,
    Finished,
    Aborted,
}

struct ControlState {
    turn: Option<OperationId>,
    handles: HashMap<OperationId, Arc<Condvar>>,
    phase: ControlPhase,
}

/// Turn token plus one wait handle per bound operation.
pub(crate) struct ExecutionControl {
    state: Mutex<ControlState>,
    completion: Condvar,
}

impl ExecutionControl {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ControlState {
                turn: None,
                handles: HashMap::new(),
                phase: ControlPhase::Running,
            }),
            completion: Condvar::new(),
        }
    }

    /// Create the wait handle of a newly registered operation.
    pub(crate) fn bind(&self, id: OperationId) {
        self.state.lock().handles.insert(id, Arc::new(Condvar::new()));
    }

    /// Give the first turn of the iteration.
    pub(crate) fn start(&self, first: OperationId) -> Result<(), ControlError> {
        self.unblock(first)
    }

    /// Operation currently holding the turn.
    pub(crate) fn turn(&self) -> Option<OperationId> {
        self.state.lock().turn
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.state.lock().phase == ControlPhase::Aborted
    }

    /// Hand the turn to `id` and wake it.
    pub(crate) fn unblock(&self, id: OperationId) -> Result<(), ControlError> {
        let mut state = self.state.lock();
        if state.phase == ControlPhase::Aborted {
            return Err(ControlError::Aborted);
        }
        let handle = state
            .handles
            .get(&id)
            .cloned()
            .ok_or(ControlError::Unbound(id))?;
        state.turn = Some(id);
        handle.notify_one();
        Ok(())
    }

    /// Park the calling thread until `id` holds the turn.
    pub(crate) fn block(&self, id: OperationId) -> Result<(), ControlError> {
        let mut state = self.state.lock();
        Self::wait_turn(&mut state, id)
    }

    /// Wait for the first turn of a freshly spawned operation.
    pub(crate) fn wait_for_turn(&self, id: OperationId) -> Result<(), ControlError> {
        self.block(id)
    }

    /// Pass the turn from `from` to `to`, then park until `from` gets it back.
    pub(crate) fn switch(&self, from: OperationId, to: OperationId) -> Result<(), ControlError> {
        self.unblock(to)?;
        self.block(from)
    }

    /// Pass the turn from a completed operation and release its handle.
    pub(crate) fn hand_off(&self, from: OperationId, to: OperationId) -> Result<(), ControlError> {
        self.unblock(to)?;
        self.state.lock().handles.remove(&from);
        Ok(())
    }

    /// End the iteration after its last operation completed.
    pub(crate) fn finish(&self, last: OperationId) {
        let mut state = self.state.lock();
        state.handles.remove(&last);
        state.turn = None;
        if state.phase == ControlPhase::Running {
            state.phase = ControlPhase::Finished;
        }
        self.completion.notify_all();
    }

    /// Abort the iteration: wake every parked operation so it can unwind.
    pub(crate) fn abort(&self) {
        let mut state = self.state.lock();
        if state.phase == ControlPhase::Finished {
            return;
        }
        state.phase = ControlPhase::Aborted;
        state.turn = None;
        for handle in state.handles.values() {
            handle.notify_all();
        }
        self.completion.notify_all();
    }

    /// Block the harness until the iteration finished or was aborted.
    pub(crate) fn wait_for_completion(&self) {
        let mut state = self.state.lock();
        while state.phase == ControlPhase::Running {
            self.completion.wait(&mut state);
        }
    }

    fn wait_turn(state: &mut MutexGuard<'_, ControlState>, id: OperationId) -> Result<(), ControlError> {
        let handle = state
            .handles
            .get(&id)
            .cloned()
            .ok_or(ControlError::Unbound(id))?;
        loop {
            if state.phase == ControlPhase::Aborted {
                return Err(ControlError::Aborted);
            }
            if state.turn == Some(id) {
                return Ok(());
            }
            handle.wait(state);
        }
    }
}
