use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{Decision, ExplorationStrategy};
use crate::types::{OperationId, SchedulingPointType};

/// Uniformly random choice over the enabled set.
///
/// Uses ChaCha8Rng, reseeded by [`reset`](ExplorationStrategy::reset), so the
/// same seed yields the same sequence of choices. A `Yield` point excludes
/// the caller when another operation is enabled.
#[derive(Debug, Clone)]
pub struct RandomStrategy {
    rng: ChaCha8Rng,
}

impl RandomStrategy {
    /// Create the strategy. The seed is set per iteration by `reset`.
    pub fn new() -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(0),
        }
    }
}

impl Default for RandomStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ExplorationStrategy for RandomStrategy {
    fn name(&self) -> &str {
        "random"
    }

    fn reset(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    fn next_operation(&mut self, decision: &Decision<'_>) -> OperationId {
        if decision.point == SchedulingPointType::Yield && decision.enabled.len() > 1 {
            let others: Vec<OperationId> = decision
                .enabled
                .iter()
                .copied()
                .filter(|id| *id != decision.current)
                .collect();
            if !others.is_empty() {
                return others[self.rng.random_range(0..others.len())];
            }
        }
        decision.enabled[self.rng.random_range(0..decision.enabled.len())]
    }
}
