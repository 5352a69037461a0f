//! Contracts at the boundary with foreign asynchronous code.
//!
//! Two entry points let instrumented code hand foreign awaitables to the
//! scheduler:
//!
//! - [`wrap`] turns a future into a [`ControlledFuture`] whose completion is
//!   a forced `Resolve` scheduling point. While it is pending the awaiting
//!   operation is blocked in the registry, so other operations run and a
//!   future nobody can wake is reported as a deadlock.
//! - [`ensure_controlled`] checks that a handle returned by some call site is
//!   one the scheduler controls, and reports [`UncontrolledConcurrency`]
//!   otherwise.
//!
//! [`UncontrolledConcurrency`]: SchedulingError::UncontrolledConcurrency

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use crate::error::{SchedulingError, SchedulingResult};
use crate::runtime::{context, Runtime};
use crate::task;
use crate::types::OperationId;

/// Wrap a foreign future so its completion is visible to the scheduler.
pub fn wrap<F: Future>(future: F) -> ControlledFuture<F> {
    ControlledFuture {
        inner: Box::pin(future),
        pending: false,
    }
}

/// A future whose resolution is a scheduling point.
///
/// Polled inside a controlled operation, a pending future blocks the operation
/// with a forced `Wait` decision until the future's waker fires; the operation
/// re-polls once it gets the turn back. When it resolves, a forced `Resolve`
/// decision runs before the output is returned. Outside a controlled
/// operation it is a plain pass-through.
pub struct ControlledFuture<F: Future> {
    inner: Pin<Box<F>>,
    pending: bool,
}

impl<F: Future> ControlledFuture<F> {
    /// Drive the future to completion on the calling thread.
    pub fn wait(self) -> F::Output {
        futures_lite::future::block_on(self)
    }

    /// Whether the future returned `Pending` at least once.
    pub fn was_pending(&self) -> bool {
        self.pending
    }
}

impl<F: Future> Future for ControlledFuture<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(ctx) = context::systematic() else {
            let polled = this.inner.as_mut().poll(cx);
            if polled.is_pending() {
                this.pending = true;
            }
            return polled;
        };

        let wake = Arc::new(ResolutionWaker {
            runtime: ctx.runtime.clone(),
            waiter: ctx.operation,
            woken: AtomicBool::new(false),
        });
        let waker = Waker::from(wake.clone());
        let mut inner_cx = Context::from_waker(&waker);
        loop {
            wake.woken.store(false, Ordering::SeqCst);
            if let Poll::Ready(output) = this.inner.as_mut().poll(&mut inner_cx) {
                ctx.runtime.resolve(ctx.operation);
                return Poll::Ready(output);
            }
            if !this.pending {
                this.pending = true;
                tracing::debug!("{} depends on a pending wrapped future", ctx.operation);
            }
            ctx.runtime.await_resolution(ctx.operation, &wake.woken);
        }
    }
}

/// Waker handed to a wrapped future polled by a controlled operation.
struct ResolutionWaker {
    runtime: Arc<Runtime>,
    waiter: OperationId,
    woken: AtomicBool,
}

impl Wake for ResolutionWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.woken.store(true, Ordering::SeqCst);
        self.runtime.notify_resolution(self.waiter);
    }
}

/// A handle to concurrent work the code under test may wait on.
pub trait AsyncHandle {
    /// Whether waiting on this handle goes through the scheduler.
    fn is_controlled(&self) -> bool;

    /// Type name used in diagnostics.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<F: Future> AsyncHandle for ControlledFuture<F> {
    fn is_controlled(&self) -> bool {
        true
    }
}

impl<T> AsyncHandle for task::JoinHandle<T> {
    fn is_controlled(&self) -> bool {
        self.id().is_some() || context::systematic().is_none()
    }
}

impl<T> AsyncHandle for std::thread::JoinHandle<T> {
    fn is_controlled(&self) -> bool {
        false
    }
}

impl<T> AsyncHandle for tokio::task::JoinHandle<T> {
    fn is_controlled(&self) -> bool {
        false
    }
}

impl<T> AsyncHandle for Pin<Box<dyn Future<Output = T> + Send>> {
    fn is_controlled(&self) -> bool {
        false
    }
}

/// Check that `handle`, returned by `call_site`, is controlled.
///
/// Under systematic testing an uncontrolled handle is recorded on the runtime,
/// which aborts the iteration at the caller's next scheduling point, and the
/// error is returned. Outside systematic testing this always succeeds.
pub fn ensure_controlled<H>(handle: &H, call_site: &str) -> SchedulingResult<()>
where
    H: AsyncHandle + ?Sized,
{
    let Some(ctx) = context::systematic() else {
        return Ok(());
    };
    if handle.is_controlled() {
        return Ok(());
    }
    let error = SchedulingError::UncontrolledConcurrency {
        call_site: call_site.to_string(),
        handle: handle.type_name().to_string(),
    };
    ctx.runtime.fail(error.clone());
    Err(error)
}
