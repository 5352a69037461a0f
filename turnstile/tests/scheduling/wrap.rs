//! Wrapped futures that stay pending across decisions.

use std::future::poll_fn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Poll, Waker};

use parking_lot::Mutex;
use turnstile::{
    task, wrap, BlockReason, OperationId, OperationStatus, RandomStrategy, RoundRobinStrategy,
    Runtime, SchedulingError, SchedulingPolicy,
};

fn round_robin_runtime() -> Arc<Runtime> {
    Runtime::new(
        SchedulingPolicy::Systematic,
        Box::new(RoundRobinStrategy::new()),
        0,
    )
}

/// Root awaits a future that only a spawned producer can complete.
fn await_producer() -> u32 {
    let ready = Arc::new(AtomicBool::new(false));
    let waker: Arc<Mutex<Option<Waker>>> = Arc::new(Mutex::new(None));

    let producer = {
        let (ready, waker) = (ready.clone(), waker.clone());
        task::spawn_named("producer", move || {
            let root = OperationId::new(0);
            let status = Runtime::current()
                .and_then(|runtime| runtime.operation(root))
                .map(|op| op.status());
            assert_eq!(
                status,
                Some(OperationStatus::Blocked(BlockReason::Resolve(root)))
            );
            ready.store(true, Ordering::SeqCst);
            if let Some(waker) = waker.lock().take() {
                waker.wake();
            }
        })
    };

    let value = wrap(poll_fn(move |cx| {
        if ready.load(Ordering::SeqCst) {
            Poll::Ready(42)
        } else {
            *waker.lock() = Some(cx.waker().clone());
            Poll::Pending
        }
    }))
    .wait();

    producer.join().expect("producer failed");
    value
}

#[test]
fn test_pending_future_lets_the_producer_run() {
    let runtime = round_robin_runtime();
    let seen = Arc::new(Mutex::new(None));

    {
        let seen = seen.clone();
        runtime
            .run(move || *seen.lock() = Some(await_producer()))
            .expect("iteration failed");
    }

    assert_eq!(*seen.lock(), Some(42));
    assert_eq!(
        runtime.trace().to_string(),
        "0:wait>1 -> 1:complete>0 -> 0:resolve>0 -> 0:complete"
    );
}

#[test]
fn test_pending_future_under_random_schedules() {
    for seed in 0..20 {
        let runtime = Runtime::new(
            SchedulingPolicy::Systematic,
            Box::new(RandomStrategy::new()),
            seed,
        );
        runtime
            .run(|| assert_eq!(await_producer(), 42))
            .expect("iteration failed");
        assert!(runtime
            .operations()
            .iter()
            .all(|op| op.status().is_completed()));
    }
}

#[test]
fn test_future_nobody_wakes_is_a_deadlock() {
    let runtime = round_robin_runtime();

    let err = runtime
        .run(|| {
            wrap(std::future::pending::<()>()).wait();
            unreachable!("root must be canceled while awaiting");
        })
        .expect_err("iteration should fail");

    assert_eq!(
        err,
        SchedulingError::Deadlock {
            blocked: vec![OperationId::new(0)],
        }
    );
}

#[test]
fn test_self_waking_future_does_not_block() {
    let runtime = round_robin_runtime();

    runtime
        .run(|| {
            let mut future = wrap(futures_lite::future::yield_now());
            futures_lite::future::block_on(&mut future);
            assert!(future.was_pending());
        })
        .expect("iteration failed");

    assert_eq!(runtime.trace().to_string(), "0:resolve>0 -> 0:complete");
}
