//! Correctness assertions for code under test.
//!
//! A failing [`assert_always!`](crate::assert_always) inside a controlled
//! operation records an `AssertionViolation` on the runtime and aborts the
//! iteration, so the bug report carries the decision trace that led to it.
//! Outside a controlled operation it panics like `assert!`.

use crate::error::SchedulingError;
use crate::runtime::{cancel_current, context};

/// Report a failed assertion.
///
/// Never returns: the current operation is unwound (systematic testing) or
/// the thread panics (everywhere else).
pub fn fail_assertion(message: &str) -> ! {
    match context::systematic() {
        Some(ctx) => {
            tracing::error!("[ALWAYS FAILED] {} in {}", message, ctx.operation);
            ctx.runtime.fail(SchedulingError::AssertionViolation(format!(
                "{message} (in {})",
                ctx.operation
            )));
            drop(ctx);
            cancel_current()
        }
        None => panic!("[ALWAYS FAILED] {}", message),
    }
}

/// Always-true assertion.
///
/// ```
/// let balance = 10;
/// turnstile::assert_always!(balance >= 0, "balance must never go negative");
/// ```
#[macro_export]
macro_rules! assert_always {
    ($condition:expr, $message:expr) => {
        if !$condition {
            $crate::assertions::fail_assertion($message);
        }
    };
}
