//! Scheduling points callable from the code under test.
//!
//! Each function here is a potential preemption: under systematic testing the
//! caller may be paused and another enabled operation resumed. Outside a
//! controlled operation (production policy, harness thread, foreign thread)
//! every function returns immediately without side effects.
//!
//! ```
//! use turnstile::scheduling_point;
//!
//! // Not inside a controlled operation: all of these are no-ops.
//! scheduling_point::interleave();
//! scheduling_point::write("balance");
//! {
//!     let _atomic = scheduling_point::suppressed();
//!     scheduling_point::yield_now();
//! }
//! assert_eq!(scheduling_point::current_operation(), None);
//! ```

use crate::runtime::context;
use crate::types::{OperationId, SchedulingPointType};

/// Let the scheduler pick any enabled operation, possibly the caller.
pub fn interleave() {
    if let Some(ctx) = context::systematic() {
        ctx.runtime
            .schedule_next(ctx.operation, SchedulingPointType::Interleave);
    }
}

/// Hint that the caller is waiting for progress from others.
///
/// Strategies that distinguish yields deprioritize the caller.
pub fn yield_now() {
    if let Some(ctx) = context::systematic() {
        ctx.runtime
            .schedule_next(ctx.operation, SchedulingPointType::Yield);
    }
}

/// Announce a read of the shared resource `state`.
pub fn read(state: &str) {
    if let Some(ctx) = context::systematic() {
        ctx.runtime
            .access(ctx.operation, SchedulingPointType::Read, state);
    }
}

/// Announce a write of the shared resource `state`.
pub fn write(state: &str) {
    if let Some(ctx) = context::systematic() {
        ctx.runtime
            .access(ctx.operation, SchedulingPointType::Write, state);
    }
}

/// Disable suppressible scheduling points until the matching [`resume`].
///
/// Calls nest. While suppressed, the caller keeps the turn through
/// `interleave`, `yield_now`, `read` and `write`; blocking on a join or a
/// signal still switches.
pub fn suppress() {
    if let Some(ctx) = context::systematic() {
        ctx.runtime.suppress(ctx.operation);
    }
}

/// Close the innermost [`suppress`] region.
///
/// An unmatched call is ignored and logged.
pub fn resume() {
    if let Some(ctx) = context::systematic() {
        ctx.runtime.resume();
    }
}

/// Suppress scheduling points until the returned guard is dropped.
pub fn suppressed() -> SuppressGuard {
    suppress();
    SuppressGuard { _private: () }
}

/// Scope guard returned by [`suppressed`].
#[must_use = "scheduling points are resumed as soon as the guard is dropped"]
pub struct SuppressGuard {
    _private: (),
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        resume();
    }
}

/// Mark the beginning of test phase `phase`.
///
/// Recorded even while points are suppressed; never a decision point.
pub fn next_phase(phase: u64) {
    if let Some(ctx) = context::systematic() {
        ctx.runtime.move_next_phase(phase);
    }
}

/// Id of the controlled operation running on this thread.
pub fn current_operation() -> Option<OperationId> {
    context::systematic().map(|ctx| ctx.operation)
}
