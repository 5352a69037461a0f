//! The scheduler core.
//!
//! A [`Runtime`] holds the scheduler state of exactly one test iteration: the
//! operation registry, the suppression depth, the current phase, the decision
//! trace and the exploration strategy. Under [`SchedulingPolicy::Systematic`]
//! every controlled operation runs on its own thread, but only the operation
//! holding the turn executes; all others are parked in [`ExecutionControl`].
//!
//! ## Decision points
//!
//! ```text
//!  scheduling point ──> aborted? ──yes──> unwind caller
//!                          │ no
//!                          v
//!                  suppressed & suppressible? ──yes──> return
//!                          │ no
//!                          v
//!                  enabled set (creation order)
//!                    │ empty              │ non-empty
//!                    v                    v
//!          blocked ops? ─yes─> Deadlock   strategy.next_operation()
//!                    │ no                 │
//!                    v                    v
//!             iteration done       record, switch if chosen != current
//! ```
//!
//! The scheduler state is only mutated by the operation holding the turn.
//! It still sits behind a mutex so that the harness can inspect it and so
//! that the runtime is `Sync`; the lock is never contended during a decision.

pub(crate) mod context;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::control::{ControlError, ExecutionControl};
use crate::error::{SchedulingError, SchedulingResult};
use crate::operation::{BlockReason, ControlledOperation};
use crate::registry::OperationRegistry;
use crate::strategy::{Decision, ExplorationStrategy};
use crate::trace::{DecisionRecord, DecisionTrace};
use crate::types::{OperationId, SchedulingPointType, SchedulingPolicy, SignalId};

use self::context::ExecutionContext;

/// Unwind payload used to cancel an operation when its iteration is aborted.
///
/// Caught at the root of every operation thread and never reported as a panic.
pub(crate) struct OperationCanceled;

/// Unwind the calling operation.
pub(crate) fn cancel_current() -> ! {
    panic::resume_unwind(Box::new(OperationCanceled))
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Outcome of a decision, realized by [`ExecutionControl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// The caller keeps the turn.
    Continue,
    /// The turn moves to another operation.
    Switch(OperationId),
    /// Every operation completed.
    Finished,
}

struct SchedulerCore {
    registry: OperationRegistry,
    strategy: Option<Box<dyn ExplorationStrategy>>,
    suppression_depth: usize,
    phase: u64,
    trace: DecisionTrace,
    failure: Option<SchedulingError>,
}

impl SchedulerCore {
    /// Compute the enabled set, consult the strategy and record the decision.
    fn next_step(
        &mut self,
        current: OperationId,
        point: SchedulingPointType,
    ) -> SchedulingResult<Step> {
        let enabled = self.registry.enabled_set();
        let resource = match point {
            SchedulingPointType::Read | SchedulingPointType::Write => self
                .registry
                .get(current)
                .map(|op| op.last_accessed_state())
                .filter(|tag| !tag.is_empty())
                .map(str::to_string),
            _ => None,
        };

        if enabled.is_empty() {
            let blocked = self.registry.blocked();
            if !blocked.is_empty() {
                return Err(SchedulingError::Deadlock { blocked });
            }
            self.trace.push(DecisionRecord {
                operation: current,
                point,
                resource,
                chosen: None,
            });
            return Ok(Step::Finished);
        }

        let step = self.trace.len();
        let strategy = self
            .strategy
            .as_mut()
            .ok_or_else(|| SchedulingError::Internal("no exploration strategy".to_string()))?;
        let decision = Decision {
            enabled: &enabled,
            current,
            point,
            resource: resource.as_deref(),
            step,
        };

        let chosen = panic::catch_unwind(AssertUnwindSafe(|| strategy.next_operation(&decision)))
            .map_err(|payload| {
                SchedulingError::Internal(format!(
                    "strategy '{}' panicked: {}",
                    strategy.name(),
                    panic_message(&*payload)
                ))
            })?;

        if !enabled.contains(&chosen) {
            return Err(SchedulingError::Internal(format!(
                "strategy '{}' chose {} outside the enabled set",
                strategy.name(),
                chosen
            )));
        }

        tracing::debug!(
            step,
            operation = %current,
            point = %point,
            chosen = %chosen,
            "scheduling decision"
        );
        self.trace.push(DecisionRecord {
            operation: current,
            point,
            resource,
            chosen: Some(chosen),
        });

        Ok(if chosen == current {
            Step::Continue
        } else {
            Step::Switch(chosen)
        })
    }

    /// Block the caller on `reason`, then pick who runs instead.
    fn block_and_decide(
        &mut self,
        current: OperationId,
        reason: BlockReason,
        point: SchedulingPointType,
    ) -> SchedulingResult<Step> {
        self.registry.block(current, reason)?;
        self.next_step(current, point)
    }

    /// Complete the caller, then pick who runs next.
    fn complete_and_decide(&mut self, current: OperationId) -> SchedulingResult<Step> {
        let woken = self.registry.complete(current)?;
        tracing::debug!("{} completed, unblocked {:?}", current, woken);
        self.next_step(current, SchedulingPointType::Complete)
    }
}

/// Scheduler state and execution control of one test iteration.
pub struct Runtime {
    policy: SchedulingPolicy,
    core: Mutex<SchedulerCore>,
    control: ExecutionControl,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
    started: AtomicBool,
}

impl Runtime {
    /// Create the runtime of a new iteration.
    ///
    /// The strategy is reset with `seed` before any decision is made.
    pub fn new(
        policy: SchedulingPolicy,
        mut strategy: Box<dyn ExplorationStrategy>,
        seed: u64,
    ) -> Arc<Self> {
        strategy.reset(seed);
        Arc::new(Self {
            policy,
            core: Mutex::new(SchedulerCore {
                registry: OperationRegistry::new(),
                strategy: Some(strategy),
                suppression_depth: 0,
                phase: 0,
                trace: DecisionTrace::new(),
                failure: None,
            }),
            control: ExecutionControl::new(),
            threads: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }

    /// Runtime controlling the calling thread, if any.
    pub fn current() -> Option<Arc<Runtime>> {
        context::current().map(|ctx| ctx.runtime)
    }

    /// Scheduling policy of this iteration.
    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    /// Run one iteration of `body` and block until it is over.
    ///
    /// Under `Systematic` policy `body` becomes the root operation and every
    /// operation it spawns is controlled. Returns the first violation found,
    /// after every operation thread has exited.
    pub fn run<F>(self: &Arc<Self>, body: F) -> SchedulingResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SchedulingError::Internal(
                "a runtime executes a single iteration".to_string(),
            ));
        }
        match self.policy {
            SchedulingPolicy::Production => panic::catch_unwind(AssertUnwindSafe(body))
                .map_err(|payload| SchedulingError::AssertionViolation(panic_message(&*payload))),
            SchedulingPolicy::Systematic => self.run_systematic(body),
        }
    }

    fn run_systematic<F>(self: &Arc<Self>, body: F) -> SchedulingResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let root = self.core.lock().registry.register(None, None);
        self.control.bind(root);
        self.launch(root, body, Arc::new(Mutex::new(None)))?;
        if let Err(e) = self.control.start(root) {
            self.fail(Self::control_failure(root, e));
        }

        self.control.wait_for_completion();
        self.join_threads();

        let core = self.core.lock();
        if let Some(failure) = core.failure.clone() {
            return Err(failure);
        }
        if !core.registry.all_completed() {
            return Err(SchedulingError::Internal(
                "iteration ended with incomplete operations".to_string(),
            ));
        }
        tracing::debug!("Iteration completed after {} decisions", core.trace.len());
        Ok(())
    }

    fn launch<F, T>(
        self: &Arc<Self>,
        id: OperationId,
        f: F,
        slot: Arc<Mutex<Option<T>>>,
    ) -> SchedulingResult<()>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let runtime = self.clone();
        let handle = thread::Builder::new()
            .name(format!("turnstile-op-{}", id.as_u64()))
            .spawn(move || runtime.run_operation(id, f, slot))
            .map_err(|e| SchedulingError::Internal(format!("failed to start {id}: {e}")))?;
        self.threads.lock().push(handle);
        Ok(())
    }

    fn run_operation<F, T>(self: &Arc<Self>, id: OperationId, f: F, slot: Arc<Mutex<Option<T>>>)
    where
        F: FnOnce() -> T,
    {
        let _binding = context::enter(ExecutionContext {
            runtime: self.clone(),
            operation: id,
        });

        match self.control.wait_for_turn(id) {
            Ok(()) => {}
            Err(ControlError::Aborted) => return,
            Err(e) => {
                self.fail(Self::control_failure(id, e));
                return;
            }
        }

        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => {
                *slot.lock() = Some(value);
                self.complete_operation(id);
            }
            Err(payload) if payload.is::<OperationCanceled>() => {
                tracing::debug!("{} canceled", id);
            }
            Err(payload) => {
                let message = panic_message(&*payload);
                self.fail(SchedulingError::AssertionViolation(format!(
                    "{id} panicked: {message}"
                )));
            }
        }
    }

    fn join_threads(&self) {
        loop {
            let next = self.threads.lock().pop();
            match next {
                Some(handle) => {
                    if handle.join().is_err() {
                        tracing::error!("Operation thread terminated abnormally");
                    }
                }
                None => break,
            }
        }
    }

    fn control_failure(id: OperationId, error: ControlError) -> SchedulingError {
        match error {
            ControlError::Aborted => {
                SchedulingError::Internal(format!("{id} lost the turn to an abort"))
            }
            ControlError::Unbound(handle) => SchedulingError::Internal(format!(
                "execution control failed for {id}: {handle} has no wait handle"
            )),
        }
    }

    /// Realize a decision for an operation that keeps existing afterwards.
    fn realize(&self, current: OperationId, step: SchedulingResult<Step>) {
        let outcome = match step {
            Ok(Step::Continue) => Ok(()),
            Ok(Step::Switch(next)) => self.control.switch(current, next),
            Ok(Step::Finished) => {
                self.fail(SchedulingError::Internal(format!(
                    "{current} finished the iteration without completing"
                )));
                cancel_current();
            }
            Err(error) => {
                self.fail(error);
                cancel_current();
            }
        };
        match outcome {
            Ok(()) => {}
            Err(ControlError::Aborted) => cancel_current(),
            Err(e) => {
                self.fail(Self::control_failure(current, e));
                cancel_current();
            }
        }
    }

    /// Unwind the caller if the iteration was aborted or it lost the turn.
    fn ensure_turn(&self, current: OperationId) {
        if self.control.is_aborted() {
            cancel_current();
        }
        if self.control.turn() != Some(current) {
            self.fail(SchedulingError::Internal(format!(
                "{current} requested a decision without holding the turn"
            )));
            cancel_current();
        }
    }

    /// Offer the scheduler a decision on behalf of `current`.
    pub(crate) fn schedule_next(&self, current: OperationId, point: SchedulingPointType) {
        self.ensure_turn(current);
        let step = {
            let mut core = self.core.lock();
            if point.is_suppressible() && core.suppression_depth > 0 {
                return;
            }
            core.next_step(current, point)
        };
        self.realize(current, step);
    }

    /// A `read`/`write` decision: tag the caller for its duration.
    pub(crate) fn access(&self, current: OperationId, point: SchedulingPointType, resource: &str) {
        let tagged = self
            .core
            .lock()
            .registry
            .set_last_accessed_state(current, resource);
        if let Err(error) = tagged {
            self.fail(error);
            cancel_current();
        }
        let _clear = AccessTagGuard {
            runtime: self,
            operation: current,
        };
        self.schedule_next(current, point);
    }

    /// Open (or nest) a suppression region.
    pub(crate) fn suppress(&self, current: OperationId) {
        let paused = {
            let mut core = self.core.lock();
            core.suppression_depth += 1;
            if core.suppression_depth == 1 {
                core.registry.pause(current)
            } else {
                Ok(())
            }
        };
        if let Err(error) = paused {
            self.fail(error);
            cancel_current();
        }
    }

    /// Close one suppression level. Extra calls leave the depth at zero.
    pub(crate) fn resume(&self) {
        let mut core = self.core.lock();
        match core.suppression_depth {
            0 => tracing::warn!("resume() without a matching suppress(), ignoring"),
            _ => {
                core.suppression_depth -= 1;
                if core.suppression_depth == 0 {
                    core.registry.unpause_all();
                }
            }
        }
    }

    /// Record a phase change. Not a decision point.
    pub(crate) fn move_next_phase(&self, phase: u64) {
        self.core.lock().phase = phase;
        tracing::info!("Moved to phase {}", phase);
    }

    /// Register and start a child operation of `parent`.
    ///
    /// The child is enabled immediately but only runs once a decision hands
    /// it the turn; spawning is not a scheduling point.
    pub(crate) fn spawn_operation<F, T>(
        self: &Arc<Self>,
        parent: OperationId,
        name: Option<String>,
        f: F,
    ) -> (OperationId, Arc<Mutex<Option<T>>>)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_turn(parent);
        let id = self.core.lock().registry.register(name, Some(parent));
        self.control.bind(id);
        let slot = Arc::new(Mutex::new(None));
        if let Err(error) = self.launch(id, f, slot.clone()) {
            self.fail(error);
            cancel_current();
        }
        (id, slot)
    }

    /// Block `current` until `target` completes.
    pub(crate) fn join_operation(&self, current: OperationId, target: OperationId) {
        self.ensure_turn(current);
        let step = {
            let mut core = self.core.lock();
            match core.registry.status(target) {
                Ok(status) if status.is_completed() => return,
                Ok(_) => core.block_and_decide(
                    current,
                    BlockReason::Join(target),
                    SchedulingPointType::Join,
                ),
                Err(error) => Err(error),
            }
        };
        self.realize(current, step);
    }

    /// Block `current` until `signal` is set.
    pub(crate) fn wait_signal(&self, current: OperationId, signal: SignalId) {
        self.ensure_turn(current);
        let step = self.core.lock().block_and_decide(
            current,
            BlockReason::Signal(signal),
            SchedulingPointType::Wait,
        );
        self.realize(current, step);
    }

    /// Unblock every operation waiting on `signal`. Not a decision point.
    pub(crate) fn notify_signal(&self, signal: SignalId) {
        let woken = self
            .core
            .lock()
            .registry
            .unblock_waiters(BlockReason::Signal(signal));
        if !woken.is_empty() {
            tracing::debug!("{} unblocked {:?}", signal, woken);
        }
    }

    /// Block `current` on a pending wrapped future until its waker fires.
    ///
    /// `woken` is set by the waker before it unblocks the operation, so a
    /// wake that raced the last poll returns at once for another poll.
    pub(crate) fn await_resolution(&self, current: OperationId, woken: &AtomicBool) {
        self.ensure_turn(current);
        let step = {
            let mut core = self.core.lock();
            if woken.swap(false, Ordering::SeqCst) {
                return;
            }
            core.block_and_decide(
                current,
                BlockReason::Resolve(current),
                SchedulingPointType::Wait,
            )
        };
        self.realize(current, step);
    }

    /// Unblock `waiter` if it is blocked on a wrapped future. Not a decision point.
    pub(crate) fn notify_resolution(&self, waiter: OperationId) {
        let woken = self
            .core
            .lock()
            .registry
            .unblock_waiters(BlockReason::Resolve(waiter));
        if !woken.is_empty() {
            tracing::debug!("wrapped future of {} woke up", waiter);
        }
    }

    /// A wrapped foreign awaitable resolved inside `current`.
    pub(crate) fn resolve(&self, current: OperationId) {
        self.schedule_next(current, SchedulingPointType::Resolve);
    }

    fn complete_operation(&self, id: OperationId) {
        if self.control.is_aborted() {
            return;
        }
        let step = self.core.lock().complete_and_decide(id);
        let outcome = match step {
            Ok(Step::Finished) => {
                self.control.finish(id);
                Ok(())
            }
            Ok(Step::Switch(next)) => self.control.hand_off(id, next),
            Ok(Step::Continue) => {
                self.fail(SchedulingError::Internal(format!(
                    "{id} was scheduled again after completing"
                )));
                Ok(())
            }
            Err(error) => {
                self.fail(error);
                Ok(())
            }
        };
        match outcome {
            Ok(()) | Err(ControlError::Aborted) => {}
            Err(e) => self.fail(Self::control_failure(id, e)),
        }
    }

    /// Record a violation and abort the iteration.
    ///
    /// The first violation wins, except that an internal error always
    /// replaces a violation of the code under test.
    pub(crate) fn fail(&self, error: SchedulingError) {
        {
            let mut core = self.core.lock();
            let replace = match &core.failure {
                None => true,
                Some(existing) => error.is_internal() && !existing.is_internal(),
            };
            if replace {
                tracing::error!("Iteration failed: {}", error);
                core.failure = Some(error);
            }
        }
        self.control.abort();
    }

    /// Decision trace recorded so far.
    pub fn trace(&self) -> DecisionTrace {
        self.core.lock().trace.clone()
    }

    /// Snapshot of every registered operation.
    pub fn operations(&self) -> Vec<ControlledOperation> {
        self.core.lock().registry.operations()
    }

    /// Snapshot of one operation.
    pub fn operation(&self, id: OperationId) -> Option<ControlledOperation> {
        self.core.lock().registry.get(id).cloned()
    }

    /// Number of registered operations.
    pub fn registry_len(&self) -> usize {
        self.core.lock().registry.len()
    }

    /// Ancestors of an operation, nearest first.
    pub fn ancestors(&self, id: OperationId) -> Vec<OperationId> {
        self.core.lock().registry.ancestors(id)
    }

    /// Current suppression depth.
    pub fn suppression_depth(&self) -> usize {
        self.core.lock().suppression_depth
    }

    /// Last phase passed to `next_phase`.
    pub fn phase(&self) -> u64 {
        self.core.lock().phase
    }

    /// First violation recorded in this iteration.
    pub fn failure(&self) -> Option<SchedulingError> {
        self.core.lock().failure.clone()
    }

    /// Take the strategy back once the iteration is over.
    pub fn take_strategy(&self) -> Option<Box<dyn ExplorationStrategy>> {
        self.core.lock().strategy.take()
    }
}

/// Clears the access tag of an operation, also while unwinding.
struct AccessTagGuard<'a> {
    runtime: &'a Runtime,
    operation: OperationId,
}

impl Drop for AccessTagGuard<'_> {
    fn drop(&mut self) {
        let _ = self
            .runtime
            .core
            .lock()
            .registry
            .clear_last_accessed_state(self.operation);
    }
}
