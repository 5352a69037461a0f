//! Test engine: runs a test body over many iterations.
//!
//! Each iteration gets a fresh [`Runtime`], a seed and the engine's
//! exploration strategy. Violations are collected into a [`TestReport`];
//! an internal scheduler error stops the run immediately.
//!
//! ```
//! use turnstile::{scheduling_point, task, TestEngine};
//!
//! let report = TestEngine::new()
//!     .set_iterations(5)
//!     .set_base_seed(7)
//!     .run(|| {
//!         let worker = task::spawn(|| scheduling_point::interleave());
//!         scheduling_point::interleave();
//!         worker.join().expect("worker failed");
//!     })
//!     .expect("internal error");
//! assert!(report.is_success());
//! assert_eq!(report.iterations, 5);
//! ```

mod report;

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{SchedulingError, SchedulingResult};
use crate::runtime::Runtime;
use crate::strategy::{ExplorationStrategy, RandomStrategy, ReplayStrategy, RoundRobinStrategy};
use crate::trace::DecisionTrace;
use crate::types::SchedulingPolicy;

pub use report::{BugReport, IterationReport, TestReport};

/// How many iterations a test should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IterationControl {
    /// Run a fixed number of iterations
    FixedCount(usize),
    /// Run for a specific duration of wall-clock time
    TimeLimit(Duration),
}

impl IterationControl {
    /// Whether another iteration fits after `completed` ones took `elapsed`.
    fn allows(&self, completed: usize, elapsed: Duration) -> bool {
        match self {
            IterationControl::FixedCount(count) => completed < *count,
            IterationControl::TimeLimit(limit) => elapsed < *limit,
        }
    }
}

/// Built-in strategies selectable from a configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// [`RoundRobinStrategy`]
    RoundRobin,
    /// [`RandomStrategy`]
    #[default]
    Random,
}

impl StrategyKind {
    fn build(self) -> Box<dyn ExplorationStrategy> {
        match self {
            StrategyKind::RoundRobin => Box::new(RoundRobinStrategy::new()),
            StrategyKind::Random => Box::new(RandomStrategy::new()),
        }
    }
}

/// Plain settings behind [`TestEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfiguration {
    /// Scheduling policy of every iteration.
    pub policy: SchedulingPolicy,
    /// Strategy used unless a custom one is supplied.
    pub strategy: StrategyKind,
    /// When to stop iterating.
    pub iteration_control: IterationControl,
    /// Seeds used, in order, for the first iterations.
    pub debug_seeds: Vec<u64>,
    /// Seed later seeds are derived from. Taken from the clock when unset.
    pub base_seed: Option<u64>,
    /// Stop at the first iteration that finds a bug.
    pub stop_on_first_bug: bool,
}

impl Default for TestConfiguration {
    fn default() -> Self {
        Self {
            policy: SchedulingPolicy::Systematic,
            strategy: StrategyKind::default(),
            iteration_control: IterationControl::FixedCount(1),
            debug_seeds: Vec::new(),
            base_seed: None,
            stop_on_first_bug: true,
        }
    }
}

/// Builder for configuring and running systematic tests.
pub struct TestEngine {
    config: TestConfiguration,
    strategy: Option<Box<dyn ExplorationStrategy>>,
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEngine {
    /// Create an engine with the default configuration.
    pub fn new() -> Self {
        Self::from_config(TestConfiguration::default())
    }

    /// Create an engine from an existing configuration.
    pub fn from_config(config: TestConfiguration) -> Self {
        Self {
            config,
            strategy: None,
        }
    }

    /// Engine replaying the schedule of a bug report.
    ///
    /// Runs a single iteration with the bug's seed, following its trace.
    pub fn replay(bug: &BugReport) -> Self {
        Self::new()
            .set_debug_seeds(vec![bug.seed])
            .set_iterations(1)
            .strategy(ReplayStrategy::new(bug.trace.clone()))
    }

    /// Engine replaying a recorded trace.
    pub fn replay_trace(trace: DecisionTrace) -> Self {
        Self::new()
            .set_iterations(1)
            .strategy(ReplayStrategy::new(trace))
    }

    /// Current configuration.
    pub fn config(&self) -> &TestConfiguration {
        &self.config
    }

    /// Set the scheduling policy.
    pub fn policy(mut self, policy: SchedulingPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Use one of the built-in strategies.
    pub fn strategy_kind(mut self, kind: StrategyKind) -> Self {
        self.config.strategy = kind;
        self.strategy = None;
        self
    }

    /// Use a custom strategy.
    pub fn strategy(mut self, strategy: impl ExplorationStrategy + 'static) -> Self {
        self.strategy = Some(Box::new(strategy));
        self
    }

    /// Run a fixed number of iterations.
    pub fn set_iterations(mut self, iterations: usize) -> Self {
        self.config.iteration_control = IterationControl::FixedCount(iterations);
        self
    }

    /// Set the iteration control.
    pub fn set_iteration_control(mut self, control: IterationControl) -> Self {
        self.config.iteration_control = control;
        self
    }

    /// Run iterations until `duration` elapsed.
    pub fn set_time_limit(mut self, duration: Duration) -> Self {
        self.config.iteration_control = IterationControl::TimeLimit(duration);
        self
    }

    /// Seeds for the first iterations.
    pub fn set_debug_seeds(mut self, seeds: Vec<u64>) -> Self {
        self.config.debug_seeds = seeds;
        self
    }

    /// Seed later iteration seeds are derived from.
    pub fn set_base_seed(mut self, seed: u64) -> Self {
        self.config.base_seed = Some(seed);
        self
    }

    /// Whether to stop at the first bug.
    pub fn stop_on_first_bug(mut self, stop: bool) -> Self {
        self.config.stop_on_first_bug = stop;
        self
    }

    /// Run `body` once per iteration and report what was found.
    ///
    /// Returns `Err` only for [`SchedulingError::Internal`]; violations of the
    /// code under test end up in the report.
    #[tracing::instrument(skip_all)]
    pub fn run<F>(self, body: F) -> SchedulingResult<TestReport>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let Self { config, strategy } = self;
        let mut strategy = strategy.unwrap_or_else(|| config.strategy.build());
        let body = Arc::new(body);
        let mut seeds = SeedSchedule::new(&config);
        let mut seeds_used = Vec::new();
        let mut collector = ReportCollector::default();
        let start = Instant::now();

        while config
            .iteration_control
            .allows(seeds_used.len(), start.elapsed())
        {
            let seed = seeds.next_seed();
            seeds_used.push(seed);
            let iteration = seeds_used.len();
            tracing::info!(iteration, seed, "Starting iteration");

            let runtime = Runtime::new(config.policy, strategy, seed);
            let iteration_start = Instant::now();
            let outcome = {
                let body = body.clone();
                runtime.run(move || (*body)())
            };
            let wall_time = iteration_start.elapsed();

            strategy = runtime.take_strategy().ok_or_else(|| {
                SchedulingError::Internal("strategy lost during iteration".to_string())
            })?;

            if let Err(error) = &outcome {
                if error.is_internal() {
                    tracing::error!(
                        "Internal scheduler error in iteration {} (seed {}): {}",
                        iteration,
                        seed,
                        error
                    );
                    return Err(error.clone());
                }
                tracing::error!(
                    "Iteration {} with seed {} failed: {}",
                    iteration,
                    seed,
                    error
                );
            }

            collector.record(IterationReport {
                iteration,
                seed,
                outcome,
                trace: runtime.trace(),
                operations: runtime.operations(),
                phase: runtime.phase(),
                wall_time,
            });

            if config.stop_on_first_bug && collector.has_bug() {
                break;
            }
        }

        let report = collector.finish(seeds_used, start.elapsed());
        tracing::info!(
            "Test finished: {} iterations, {} failed",
            report.iterations,
            report.failed_runs
        );
        Ok(report)
    }
}

/// Seeds of successive iterations.
///
/// Debug seeds are replayed first, then seeds are drawn from a ChaCha8 stream
/// keyed by the base seed, so a base seed fixes the whole sequence.
struct SeedSchedule {
    debug_seeds: std::vec::IntoIter<u64>,
    derived: ChaCha8Rng,
}

impl SeedSchedule {
    fn new(config: &TestConfiguration) -> Self {
        let base_seed = config.base_seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::SystemTime::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default()
        });
        tracing::debug!(base_seed, "Deriving iteration seeds");
        Self {
            debug_seeds: config.debug_seeds.clone().into_iter(),
            derived: ChaCha8Rng::seed_from_u64(base_seed),
        }
    }

    fn next_seed(&mut self) -> u64 {
        match self.debug_seeds.next() {
            Some(seed) => seed,
            None => self.derived.next_u64(),
        }
    }
}

#[derive(Default)]
struct ReportCollector {
    reports: Vec<IterationReport>,
    successful_runs: usize,
    failed_runs: usize,
    seeds_failing: Vec<u64>,
    total_decisions: usize,
    bug: Option<BugReport>,
}

impl ReportCollector {
    fn record(&mut self, report: IterationReport) {
        self.total_decisions += report.trace.len();
        match &report.outcome {
            Ok(()) => self.successful_runs += 1,
            Err(error) => {
                self.failed_runs += 1;
                self.seeds_failing.push(report.seed);
                if self.bug.is_none() {
                    self.bug = Some(BugReport {
                        iteration: report.iteration,
                        seed: report.seed,
                        error: error.clone(),
                        trace: report.trace.clone(),
                    });
                }
            }
        }
        self.reports.push(report);
    }

    fn has_bug(&self) -> bool {
        self.bug.is_some()
    }

    fn finish(self, seeds_used: Vec<u64>, wall_time: Duration) -> TestReport {
        TestReport {
            iterations: self.reports.len(),
            successful_runs: self.successful_runs,
            failed_runs: self.failed_runs,
            seeds_used,
            seeds_failing: self.seeds_failing,
            total_decisions: self.total_decisions,
            bug: self.bug,
            iteration_reports: self.reports,
            wall_time,
        }
    }
}
