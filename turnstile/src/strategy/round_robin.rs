use super::{Decision, ExplorationStrategy};
use crate::types::OperationId;

/// Reference strategy: hand the turn to the next enabled operation.
///
/// "Next" is the first enabled operation created after the caller, wrapping to
/// the oldest enabled one. The caller is never re-picked while another
/// operation is enabled, so every voluntary point is a switch.
#[derive(Debug, Clone, Default)]
pub struct RoundRobinStrategy;

impl RoundRobinStrategy {
    /// Create the strategy.
    pub fn new() -> Self {
        Self
    }
}

impl ExplorationStrategy for RoundRobinStrategy {
    fn name(&self) -> &str {
        "round-robin"
    }

    fn reset(&mut self, _seed: u64) {}

    fn next_operation(&mut self, decision: &Decision<'_>) -> OperationId {
        decision
            .enabled
            .iter()
            .copied()
            .find(|id| *id > decision.current)
            .unwrap_or(decision.enabled[0])
    }
}
