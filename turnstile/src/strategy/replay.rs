use super::{Decision, ExplorationStrategy};
use crate::trace::DecisionTrace;
use crate::types::OperationId;

/// Replays the choices of a recorded trace.
///
/// Decision `i` of the new run gets the operation chosen at record `i`, as
/// long as the same operation asks for the same kind of decision. When the run
/// stops matching the recording, the strategy falls back to the oldest enabled
/// operation and remembers the step where it diverged.
#[derive(Debug, Clone)]
pub struct ReplayStrategy {
    recorded: DecisionTrace,
    diverged_at: Option<usize>,
}

impl ReplayStrategy {
    /// Replay the given trace.
    pub fn new(recorded: DecisionTrace) -> Self {
        Self {
            recorded,
            diverged_at: None,
        }
    }

    /// Step at which the current iteration stopped following the recording.
    pub fn diverged_at(&self) -> Option<usize> {
        self.diverged_at
    }

    fn expected_choice(&self, decision: &Decision<'_>) -> Option<OperationId> {
        let record = self.recorded.records().get(decision.step)?;
        if record.operation != decision.current || record.point != decision.point {
            return None;
        }
        record
            .chosen
            .filter(|chosen| decision.enabled.contains(chosen))
    }
}

impl ExplorationStrategy for ReplayStrategy {
    fn name(&self) -> &str {
        "replay"
    }

    fn reset(&mut self, _seed: u64) {
        self.diverged_at = None;
    }

    fn next_operation(&mut self, decision: &Decision<'_>) -> OperationId {
        if self.diverged_at.is_none() {
            if let Some(chosen) = self.expected_choice(decision) {
                return chosen;
            }
            tracing::warn!(
                "Replay diverged at step {} ({} at {})",
                decision.step,
                decision.current,
                decision.point
            );
            self.diverged_at = Some(decision.step);
        }
        decision.enabled[0]
    }
}
