//! Registry of controlled operations for one iteration.
//!
//! The registry is owned by the scheduler core and only mutated by the
//! operation currently holding the turn. Operations are stored in creation
//! order and never removed before teardown, so completed operations stay
//! available for traces and causal queries.

use crate::error::{SchedulingError, SchedulingResult};
use crate::operation::{BlockReason, ControlledOperation, OperationStatus};
use crate::types::OperationId;

/// Set of tracked operations and their lifecycle state.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: Vec<ControlledOperation>,
    region_owner: Option<OperationId>,
}

impl OperationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new operation in the `Enabled` state.
    ///
    /// Must happen before any work of that operation runs.
    pub fn register(&mut self, name: Option<String>, parent: Option<OperationId>) -> OperationId {
        let id = OperationId::new(self.operations.len() as u64);
        let name = name.unwrap_or_else(|| match parent {
            None => "root".to_string(),
            Some(_) => format!("op-{}", id.as_u64()),
        });
        tracing::debug!("Registered {} '{}' (parent: {:?})", id, name, parent);
        self.operations
            .push(ControlledOperation::new(id, name, parent));
        id
    }

    /// Number of registered operations, completed ones included.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether no operation was registered.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Look up an operation.
    pub fn get(&self, id: OperationId) -> Option<&ControlledOperation> {
        self.operations.get(id.sequence())
    }

    fn get_mut(&mut self, id: OperationId) -> SchedulingResult<&mut ControlledOperation> {
        self.operations
            .get_mut(id.sequence())
            .ok_or_else(|| SchedulingError::Internal(format!("unknown operation {id}")))
    }

    /// Status of an operation.
    pub fn status(&self, id: OperationId) -> SchedulingResult<OperationStatus> {
        self.get(id)
            .map(ControlledOperation::status)
            .ok_or_else(|| SchedulingError::Internal(format!("unknown operation {id}")))
    }

    /// Iterate operations in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &ControlledOperation> {
        self.operations.iter()
    }

    /// Snapshot of every operation.
    pub fn operations(&self) -> Vec<ControlledOperation> {
        self.operations.clone()
    }

    /// Enabled operations in creation order.
    pub fn enabled_set(&self) -> Vec<OperationId> {
        self.operations
            .iter()
            .filter(|op| op.status().is_enabled())
            .map(ControlledOperation::id)
            .collect()
    }

    /// Blocked operations in creation order.
    pub fn blocked(&self) -> Vec<OperationId> {
        self.operations
            .iter()
            .filter(|op| op.status().is_blocked())
            .map(ControlledOperation::id)
            .collect()
    }

    /// Whether every registered operation completed.
    pub fn all_completed(&self) -> bool {
        self.operations.iter().all(|op| op.status().is_completed())
    }

    /// Block an enabled operation.
    pub fn block(&mut self, id: OperationId, reason: BlockReason) -> SchedulingResult<()> {
        let op = self.get_mut(id)?;
        if !op.status().is_enabled() {
            return Err(SchedulingError::Internal(format!(
                "cannot block {id} in status {:?}",
                op.status()
            )));
        }
        op.set_status(OperationStatus::Blocked(reason));
        Ok(())
    }

    /// Status an unblocked operation returns to.
    ///
    /// The owner of an open suppression region gets its `Paused` mark back.
    fn runnable_status(region_owner: Option<OperationId>, id: OperationId) -> OperationStatus {
        if region_owner == Some(id) {
            OperationStatus::Paused
        } else {
            OperationStatus::Enabled
        }
    }

    /// Unblock a blocked operation.
    pub fn unblock(&mut self, id: OperationId) -> SchedulingResult<()> {
        let owner = self.region_owner;
        let op = self.get_mut(id)?;
        if !op.status().is_blocked() {
            return Err(SchedulingError::Internal(format!(
                "cannot unblock {id} in status {:?}",
                op.status()
            )));
        }
        op.set_status(Self::runnable_status(owner, id));
        Ok(())
    }

    /// Unblock every operation blocked for `reason`, returning them.
    pub fn unblock_waiters(&mut self, reason: BlockReason) -> Vec<OperationId> {
        let owner = self.region_owner;
        let mut woken = Vec::new();
        for op in self.operations.iter_mut() {
            if op.status() == OperationStatus::Blocked(reason) {
                op.set_status(Self::runnable_status(owner, op.id()));
                woken.push(op.id());
            }
        }
        woken
    }

    /// Mark an operation completed and unblock operations joining it.
    pub fn complete(&mut self, id: OperationId) -> SchedulingResult<Vec<OperationId>> {
        let op = self.get_mut(id)?;
        if !op.status().is_enabled() {
            return Err(SchedulingError::Internal(format!(
                "cannot complete {id} in status {:?}",
                op.status()
            )));
        }
        op.set_status(OperationStatus::Completed);
        op.clear_last_accessed_state();
        Ok(self.unblock_waiters(BlockReason::Join(id)))
    }

    /// Mark the operation opening a suppression region.
    ///
    /// The mark survives the owner blocking inside the region: it is restored
    /// when the owner is unblocked, until [`unpause_all`](Self::unpause_all).
    pub fn pause(&mut self, id: OperationId) -> SchedulingResult<()> {
        let op = self.get_mut(id)?;
        if op.status() == OperationStatus::Enabled {
            op.set_status(OperationStatus::Paused);
        }
        self.region_owner = Some(id);
        Ok(())
    }

    /// Owner of the open suppression region, if any.
    pub fn region_owner(&self) -> Option<OperationId> {
        self.region_owner
    }

    /// Clear the paused mark of every operation when suppression ends.
    pub fn unpause_all(&mut self) {
        self.region_owner = None;
        for op in self.operations.iter_mut() {
            if op.status() == OperationStatus::Paused {
                op.set_status(OperationStatus::Enabled);
            }
        }
    }

    /// Tag an operation with the resource of an in-flight access.
    pub fn set_last_accessed_state(&mut self, id: OperationId, state: &str) -> SchedulingResult<()> {
        self.get_mut(id)?.set_last_accessed_state(state);
        Ok(())
    }

    /// Clear the access tag of an operation.
    pub fn clear_last_accessed_state(&mut self, id: OperationId) -> SchedulingResult<()> {
        self.get_mut(id)?.clear_last_accessed_state();
        Ok(())
    }

    /// Parent of an operation.
    pub fn parent(&self, id: OperationId) -> Option<OperationId> {
        self.get(id).and_then(ControlledOperation::parent)
    }

    /// Ancestors of an operation, nearest first.
    pub fn ancestors(&self, id: OperationId) -> Vec<OperationId> {
        let mut ancestors = Vec::new();
        let mut cursor = self.parent(id);
        while let Some(parent) = cursor {
            ancestors.push(parent);
            cursor = self.parent(parent);
        }
        ancestors
    }

    /// Operations spawned directly by `id`.
    pub fn children(&self, id: OperationId) -> Vec<OperationId> {
        self.operations
            .iter()
            .filter(|op| op.parent() == Some(id))
            .map(ControlledOperation::id)
            .collect()
    }

    /// Whether `ancestor` transitively spawned `id`.
    pub fn is_ancestor(&self, ancestor: OperationId, id: OperationId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }
}
