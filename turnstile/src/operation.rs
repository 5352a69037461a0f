//! Controlled operations and their lifecycle state.

use std::fmt;

use serde::Serialize;

use crate::types::{OperationId, SignalId};

/// What a blocked operation is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockReason {
    /// Waiting for the given operation to complete.
    Join(OperationId),
    /// Waiting for the given signal to be set.
    Signal(SignalId),
    /// Waiting for a pending wrapped future awaited by the given operation.
    Resolve(OperationId),
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Join(id) => write!(f, "join {id}"),
            BlockReason::Signal(id) => write!(f, "wait {id}"),
            BlockReason::Resolve(id) => write!(f, "future awaited by {id}"),
        }
    }
}

/// Lifecycle status of a controlled operation.
///
/// Transitions are `Enabled -> {Blocked <-> Enabled}* -> Completed`. `Paused`
/// marks the operation that opened a suppression region; it counts as enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// Ready to run when scheduled.
    Enabled,
    /// Enabled, inside a suppression region it opened.
    Paused,
    /// Waiting on another operation or a signal.
    Blocked(BlockReason),
    /// Finished; never scheduled again.
    Completed,
}

impl OperationStatus {
    /// Whether the operation belongs in the enabled set.
    pub fn is_enabled(&self) -> bool {
        matches!(self, OperationStatus::Enabled | OperationStatus::Paused)
    }

    /// Whether the operation is blocked.
    pub fn is_blocked(&self) -> bool {
        matches!(self, OperationStatus::Blocked(_))
    }

    /// Whether the operation has completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, OperationStatus::Completed)
    }
}

impl Serialize for OperationStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OperationStatus::Enabled => serializer.serialize_str("enabled"),
            OperationStatus::Paused => serializer.serialize_str("paused"),
            OperationStatus::Blocked(reason) => {
                serializer.serialize_str(&format!("blocked ({reason})"))
            }
            OperationStatus::Completed => serializer.serialize_str("completed"),
        }
    }
}

/// A unit of concurrent work tracked by the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct ControlledOperation {
    id: OperationId,
    name: String,
    status: OperationStatus,
    last_accessed_state: String,
    parent: Option<OperationId>,
}

impl ControlledOperation {
    pub(crate) fn new(id: OperationId, name: String, parent: Option<OperationId>) -> Self {
        Self {
            id,
            name,
            status: OperationStatus::Enabled,
            last_accessed_state: String::new(),
            parent,
        }
    }

    /// Stable identifier.
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// Creation index, used as the deterministic tie-break.
    pub fn sequence(&self) -> usize {
        self.id.sequence()
    }

    /// Diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current status.
    pub fn status(&self) -> OperationStatus {
        self.status
    }

    /// Resource tag of an in-flight `read`/`write` decision, empty otherwise.
    pub fn last_accessed_state(&self) -> &str {
        &self.last_accessed_state
    }

    /// The operation that spawned this one, if any.
    ///
    /// This is a plain id, never an ownership edge.
    pub fn parent(&self) -> Option<OperationId> {
        self.parent
    }

    pub(crate) fn set_status(&mut self, status: OperationStatus) {
        self.status = status;
    }

    pub(crate) fn set_last_accessed_state(&mut self, state: &str) {
        self.last_accessed_state.clear();
        self.last_accessed_state.push_str(state);
    }

    pub(crate) fn clear_last_accessed_state(&mut self) {
        self.last_accessed_state.clear();
    }
}

impl fmt::Display for ControlledOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' ({:?})", self.id, self.name, self.status)
    }
}
