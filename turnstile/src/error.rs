//! Error types for controlled scheduling.

use thiserror::Error;

use crate::types::OperationId;

/// Errors surfaced by the scheduling core.
///
/// The first three variants are violations found in the code under test: they
/// abort the current iteration and are reported together with the decision
/// trace recorded so far. [`SchedulingError::Internal`] means the core itself
/// is broken and is never treated as an ordinary bug report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulingError {
    /// A foreign asynchronous handle escaped the scheduler's control.
    #[error("uncontrolled concurrency detected at '{call_site}': {handle} is not controlled")]
    UncontrolledConcurrency {
        /// Name of the call site that returned the handle.
        call_site: String,
        /// Type name of the offending handle.
        handle: String,
    },

    /// No operation is enabled while some remain blocked.
    #[error("deadlock detected: no operation is enabled, blocked operations: {}", format_ids(.blocked))]
    Deadlock {
        /// Operations that were blocked when the deadlock was detected.
        blocked: Vec<OperationId>,
    },

    /// An explicit correctness assertion failed, or an operation panicked.
    #[error("assertion violation: {0}")]
    AssertionViolation(String),

    /// An internal invariant of the scheduler was broken.
    #[error("scheduler internal error: {0}")]
    Internal(String),
}

impl SchedulingError {
    /// Whether this error indicates a bug in the scheduler itself.
    pub fn is_internal(&self) -> bool {
        matches!(self, SchedulingError::Internal(_))
    }

    /// Short, stable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulingError::UncontrolledConcurrency { .. } => "UncontrolledConcurrencyError",
            SchedulingError::Deadlock { .. } => "DeadlockError",
            SchedulingError::AssertionViolation(_) => "AssertionViolation",
            SchedulingError::Internal(_) => "SchedulerInternalError",
        }
    }
}

fn format_ids(ids: &[OperationId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A type alias for `Result<T, SchedulingError>`.
pub type SchedulingResult<T> = Result<T, SchedulingError>;
