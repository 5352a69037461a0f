//! Test metrics and reporting.

use std::fmt;
use std::time::Duration;

use crate::error::SchedulingError;
use crate::operation::ControlledOperation;
use crate::trace::DecisionTrace;

/// Everything observed during one iteration.
#[derive(Debug, Clone)]
pub struct IterationReport {
    /// 1-based iteration number.
    pub iteration: usize,
    /// Seed the strategy was reset with.
    pub seed: u64,
    /// `Ok` when the iteration completed without violation.
    pub outcome: Result<(), SchedulingError>,
    /// Decisions realized before the iteration ended.
    pub trace: DecisionTrace,
    /// Final state of every operation of the iteration.
    pub operations: Vec<ControlledOperation>,
    /// Last phase announced through `next_phase`.
    pub phase: u64,
    /// Wall-clock time of the iteration
    pub wall_time: Duration,
}

impl IterationReport {
    /// Whether the iteration found a bug.
    pub fn is_failure(&self) -> bool {
        self.outcome.is_err()
    }
}

/// A violation found by the engine, with what is needed to replay it.
#[derive(Debug, Clone)]
pub struct BugReport {
    /// Iteration that found the bug.
    pub iteration: usize,
    /// Seed of that iteration.
    pub seed: u64,
    /// The violation.
    pub error: SchedulingError,
    /// Decisions leading to the violation.
    pub trace: DecisionTrace,
}

impl fmt::Display for BugReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Bug Found ===")?;
        writeln!(f, "Kind: {}", self.error.kind())?;
        writeln!(f, "Error: {}", self.error)?;
        writeln!(f, "Iteration: {}", self.iteration)?;
        writeln!(f, "Seed: {}", self.seed)?;
        writeln!(f, "Decisions: {}", self.trace.len())?;
        writeln!(f, "Trace: {}", self.trace)
    }
}

/// Report of a test run across all iterations.
#[derive(Debug, Clone)]
pub struct TestReport {
    /// Number of iterations executed
    pub iterations: usize,
    /// Number of iterations without violation
    pub successful_runs: usize,
    /// Number of iterations with a violation
    pub failed_runs: usize,
    /// Seeds used for each iteration
    pub seeds_used: Vec<u64>,
    /// failed seeds
    pub seeds_failing: Vec<u64>,
    /// Scheduling decisions realized across all iterations.
    pub total_decisions: usize,
    /// First bug found, if any.
    pub bug: Option<BugReport>,
    /// Per-iteration details, in execution order.
    pub iteration_reports: Vec<IterationReport>,
    /// Wall-clock time of the whole run
    pub wall_time: Duration,
}

impl TestReport {
    /// Whether no iteration found a bug.
    pub fn is_success(&self) -> bool {
        self.failed_runs == 0
    }

    /// Calculate the success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            (self.successful_runs as f64 / self.iterations as f64) * 100.0
        }
    }

    /// Average number of decisions per iteration.
    pub fn average_decisions(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.total_decisions as f64 / self.iterations as f64
        }
    }

    /// Get the average wall time per iteration.
    pub fn average_wall_time(&self) -> Duration {
        if self.iterations == 0 {
            Duration::ZERO
        } else {
            self.wall_time / self.iterations as u32
        }
    }
}

impl fmt::Display for TestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Test Report ===")?;
        writeln!(f, "Iterations: {}", self.iterations)?;
        writeln!(f, "Successful: {}", self.successful_runs)?;
        writeln!(f, "Failed: {}", self.failed_runs)?;
        writeln!(f, "Success Rate: {:.2}%", self.success_rate())?;
        writeln!(f)?;
        writeln!(f, "Total Decisions: {}", self.total_decisions)?;
        writeln!(f, "Average Decisions: {:.1}", self.average_decisions())?;
        writeln!(f, "Average Wall Time: {:?}", self.average_wall_time())?;

        if !self.seeds_failing.is_empty() {
            writeln!(f)?;
            writeln!(f, "Faulty seeds: {:?}", self.seeds_failing)?;
        }

        if let Some(ref bug) = self.bug {
            writeln!(f)?;
            write!(f, "{bug}")?;
        }

        writeln!(f)?;

        Ok(())
    }
}
