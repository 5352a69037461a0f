//! Access tags of `read`/`write` decisions.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use turnstile::{
    scheduling_point, task, Decision, ExplorationStrategy, OperationId, RandomStrategy,
    RoundRobinStrategy, Runtime, SchedulingError, SchedulingPointType, SchedulingPolicy,
};

fn current_tag(id: OperationId) -> String {
    Runtime::current()
        .and_then(|runtime| runtime.operation(id))
        .map(|op| op.last_accessed_state().to_string())
        .expect("operation not found")
}

/// Round-robin that remembers the resource of every decision.
struct RecordingStrategy {
    inner: RoundRobinStrategy,
    seen: Arc<Mutex<Vec<Option<String>>>>,
}

impl ExplorationStrategy for RecordingStrategy {
    fn name(&self) -> &str {
        "recording"
    }

    fn reset(&mut self, seed: u64) {
        self.inner.reset(seed);
    }

    fn next_operation(&mut self, decision: &Decision<'_>) -> OperationId {
        self.seen.lock().push(decision.resource.map(str::to_string));
        self.inner.next_operation(decision)
    }
}

#[test]
fn test_tag_is_set_only_during_the_decision() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let runtime = Runtime::new(
        SchedulingPolicy::Systematic,
        Box::new(RecordingStrategy {
            inner: RoundRobinStrategy::new(),
            seen: seen.clone(),
        }),
        0,
    );

    runtime
        .run(|| {
            let root = OperationId::new(0);
            let worker = task::spawn(move || {
                // The root is parked inside its write decision.
                assert_eq!(current_tag(root), "x");
            });
            scheduling_point::write("x");
            assert_eq!(current_tag(root), "");
            worker.join().expect("worker failed");
        })
        .expect("iteration failed");

    assert_eq!(
        runtime.trace().to_string(),
        "0:write(x)>1 -> 1:complete>0 -> 0:complete"
    );
    assert_eq!(*seen.lock(), vec![Some("x".to_string()), None]);
    assert!(runtime
        .operations()
        .iter()
        .all(|op| op.last_accessed_state().is_empty()));
}

/// Strategy that panics on every `read` decision.
struct PanicOnRead;

impl ExplorationStrategy for PanicOnRead {
    fn name(&self) -> &str {
        "panic-on-read"
    }

    fn reset(&mut self, _seed: u64) {}

    fn next_operation(&mut self, decision: &Decision<'_>) -> OperationId {
        if decision.point == SchedulingPointType::Read {
            panic!("strategy failure");
        }
        decision.enabled[0]
    }
}

#[test]
fn test_tag_is_cleared_when_the_strategy_panics() {
    let runtime = Runtime::new(SchedulingPolicy::Systematic, Box::new(PanicOnRead), 0);

    let err = runtime
        .run(|| {
            let worker = task::spawn(|| scheduling_point::read("X"));
            worker.join().expect("worker failed");
        })
        .expect_err("iteration should fail");

    assert!(err.is_internal(), "unexpected error: {err}");
    assert!(matches!(err, SchedulingError::Internal(ref msg) if msg.contains("strategy failure")));
    assert!(runtime
        .operations()
        .iter()
        .all(|op| op.last_accessed_state().is_empty()));
}

#[test]
fn test_write_before_read_when_observed() {
    for seed in 0..50 {
        let value = Arc::new(AtomicU32::new(0));
        let observed = Arc::new(AtomicU32::new(0));
        let runtime = Runtime::new(
            SchedulingPolicy::Systematic,
            Box::new(RandomStrategy::new()),
            seed,
        );

        {
            let value = value.clone();
            let observed = observed.clone();
            runtime
                .run(move || {
                    let writer = {
                        let value = value.clone();
                        task::spawn(move || {
                            let me = scheduling_point::current_operation().expect("uncontrolled");
                            value.store(1, Ordering::SeqCst);
                            scheduling_point::write("x");
                            assert_eq!(current_tag(me), "");
                            scheduling_point::interleave();
                        })
                    };
                    let reader = task::spawn(move || {
                        let me = scheduling_point::current_operation().expect("uncontrolled");
                        let seen = value.load(Ordering::SeqCst);
                        scheduling_point::read("x");
                        assert_eq!(current_tag(me), "");
                        observed.store(seen, Ordering::SeqCst);
                    });
                    writer.join().expect("writer failed");
                    reader.join().expect("reader failed");
                })
                .expect("iteration failed");
        }

        let trace = runtime.trace();
        let position = |point: SchedulingPointType| {
            trace
                .iter()
                .position(|record| record.point == point && record.resource.as_deref() == Some("x"))
        };
        let write = position(SchedulingPointType::Write).expect("no write decision");
        let read = position(SchedulingPointType::Read).expect("no read decision");
        if observed.load(Ordering::SeqCst) == 1 {
            assert!(write < read, "seed {seed}: read observed a later write: {trace}");
        }
        assert!(runtime
            .operations()
            .iter()
            .all(|op| op.last_accessed_state().is_empty()));
    }
}
