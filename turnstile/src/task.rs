//! Controlled tasks.
//!
//! [`spawn`] creates a new operation when called from a controlled operation,
//! and a plain OS thread otherwise. The returned [`JoinHandle`] blocks through
//! the scheduler, so waiting for a task is a forced `Join` decision instead
//! of an invisible OS-level wait.

use std::any::Any;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::runtime::{context, Runtime};
use crate::types::OperationId;

/// Spawn a task running `f`.
pub fn spawn<F, T>(f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    spawn_inner(None, f)
}

/// Spawn a task with a diagnostic name.
///
/// The name labels the operation in reports; it is ignored in production.
pub fn spawn_named<F, T>(name: impl Into<String>, f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    spawn_inner(Some(name.into()), f)
}

fn spawn_inner<F, T>(name: Option<String>, f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match context::systematic() {
        Some(ctx) => {
            let (id, slot) = ctx.runtime.spawn_operation(ctx.operation, name, f);
            JoinHandle {
                inner: Inner::Controlled {
                    id,
                    slot,
                    runtime: ctx.runtime,
                },
            }
        }
        None => JoinHandle {
            inner: Inner::Production(thread::spawn(f)),
        },
    }
}

/// Owned permission to wait for a spawned task.
pub struct JoinHandle<T> {
    inner: Inner<T>,
}

enum Inner<T> {
    Production(thread::JoinHandle<T>),
    Controlled {
        id: OperationId,
        slot: Arc<Mutex<Option<T>>>,
        runtime: Arc<Runtime>,
    },
}

impl<T> JoinHandle<T> {
    /// Operation backing this task, `None` for a production thread.
    pub fn id(&self) -> Option<OperationId> {
        match &self.inner {
            Inner::Production(_) => None,
            Inner::Controlled { id, .. } => Some(*id),
        }
    }

    /// Whether the task has finished.
    pub fn is_finished(&self) -> bool {
        match &self.inner {
            Inner::Production(handle) => handle.is_finished(),
            Inner::Controlled { slot, .. } => slot.lock().is_some(),
        }
    }

    /// Wait for the task and return its result.
    ///
    /// Inside a controlled operation this is a `Join` decision: the caller is
    /// blocked until the task completes and another operation runs meanwhile.
    pub fn join(self) -> thread::Result<T> {
        match self.inner {
            Inner::Production(handle) => handle.join(),
            Inner::Controlled { id, slot, runtime } => {
                let ctx = match context::systematic() {
                    Some(ctx) if Arc::ptr_eq(&ctx.runtime, &runtime) => ctx,
                    _ => return Err(missing_result(id, "joined outside its iteration")),
                };
                ctx.runtime.join_operation(ctx.operation, id);
                let value = slot.lock().take();
                value.ok_or_else(|| missing_result(id, "completed without a result"))
            }
        }
    }
}

fn missing_result(id: OperationId, reason: &str) -> Box<dyn Any + Send> {
    Box::new(format!("{id} {reason}"))
}

impl<T> std::fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Inner::Production(_) => f.debug_struct("JoinHandle").field("controlled", &false).finish(),
            Inner::Controlled { id, .. } => f
                .debug_struct("JoinHandle")
                .field("controlled", &true)
                .field("id", id)
                .finish(),
        }
    }
}
