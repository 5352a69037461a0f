//! Thread-local binding between a thread and the operation it executes.
//!
//! Every thread running a controlled operation carries the runtime of its
//! iteration and its operation id. Threads without a binding (harness
//! threads, production code, foreign threads) see no runtime at all, which
//! is what makes every scheduling point a no-op outside systematic testing.

use std::cell::RefCell;
use std::sync::Arc;

use super::Runtime;
use crate::types::OperationId;

thread_local! {
    /// Execution context of the controlled operation running on this thread.
    static CURRENT: RefCell<Option<ExecutionContext>> = const { RefCell::new(None) };
}

/// The runtime and operation bound to the current thread.
#[derive(Clone)]
pub(crate) struct ExecutionContext {
    pub(crate) runtime: Arc<Runtime>,
    pub(crate) operation: OperationId,
}

/// Restores the previous binding when dropped.
pub(crate) struct ContextGuard {
    previous: Option<ExecutionContext>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let _ = CURRENT.try_with(|current| *current.borrow_mut() = previous);
    }
}

/// Bind `context` to the current thread until the guard is dropped.
pub(crate) fn enter(context: ExecutionContext) -> ContextGuard {
    let previous = CURRENT
        .try_with(|current| current.borrow_mut().replace(context))
        .ok()
        .flatten();
    ContextGuard { previous }
}

/// Context bound to the current thread, if any.
pub(crate) fn current() -> Option<ExecutionContext> {
    CURRENT
        .try_with(|current| current.borrow().clone())
        .ok()
        .flatten()
}

/// Context bound to the current thread if its runtime controls scheduling.
pub(crate) fn systematic() -> Option<ExecutionContext> {
    CURRENT
        .try_with(|current| {
            current
                .borrow()
                .as_ref()
                .filter(|ctx| ctx.runtime.policy().is_systematic())
                .cloned()
        })
        .ok()
        .flatten()
}
