//! Exploration strategies.
//!
//! A strategy decides which operation runs next at every scheduling decision.
//! The scheduler knows nothing about how the choice is made; it only checks
//! that the chosen operation is enabled. Strategies must be deterministic for
//! a given seed so that decision traces are reproducible.
//!
//! | Strategy | Choice |
//! |----------|--------|
//! | [`RoundRobinStrategy`] | next enabled operation after the caller, wrapping |
//! | [`RandomStrategy`] | uniform over the enabled set, seeded per iteration |
//! | [`ReplayStrategy`] | the choices recorded in a [`DecisionTrace`](crate::DecisionTrace) |

mod random;
mod replay;
mod round_robin;

pub use random::RandomStrategy;
pub use replay::ReplayStrategy;
pub use round_robin::RoundRobinStrategy;

use crate::types::{OperationId, SchedulingPointType};

/// Context handed to a strategy at one scheduling decision.
#[derive(Debug, Clone, Copy)]
pub struct Decision<'a> {
    /// Enabled operations in creation order. Never empty.
    pub enabled: &'a [OperationId],
    /// Operation that requested the decision.
    pub current: OperationId,
    /// Why the decision was requested.
    pub point: SchedulingPointType,
    /// Resource tag of a `read`/`write` decision.
    pub resource: Option<&'a str>,
    /// Index of this decision within the iteration.
    pub step: usize,
}

impl Decision<'_> {
    /// Whether the caller may keep running.
    pub fn current_is_enabled(&self) -> bool {
        self.enabled.contains(&self.current)
    }
}

/// Pluggable policy choosing the next operation to run.
pub trait ExplorationStrategy: Send {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// Prepare for a new iteration. Called once before its first decision.
    fn reset(&mut self, seed: u64);

    /// Pick the next operation.
    ///
    /// The result must be a member of `decision.enabled`. Returning
    /// `decision.current` while it is enabled means "keep running".
    fn next_operation(&mut self, decision: &Decision<'_>) -> OperationId;
}

impl<S: ExplorationStrategy + ?Sized> ExplorationStrategy for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn reset(&mut self, seed: u64) {
        (**self).reset(seed)
    }

    fn next_operation(&mut self, decision: &Decision<'_>) -> OperationId {
        (**self).next_operation(decision)
    }
}
