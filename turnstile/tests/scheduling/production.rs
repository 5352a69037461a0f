//! Production policy: every scheduling point is a passthrough.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use turnstile::{
    assert_always, ensure_controlled, scheduling_point, task, wrap, RoundRobinStrategy, Runtime,
    SchedulingPolicy, Signal, TestEngine,
};

fn exercise_every_point() {
    for phase in 0..100 {
        scheduling_point::interleave();
        scheduling_point::yield_now();
        scheduling_point::read("x");
        scheduling_point::write("x");
        scheduling_point::suppress();
        scheduling_point::resume();
        scheduling_point::resume();
        scheduling_point::next_phase(phase);
        assert_eq!(scheduling_point::current_operation(), None);
    }
}

#[test]
fn test_production_runtime_records_nothing() {
    let runtime = Runtime::new(
        SchedulingPolicy::Production,
        Box::new(RoundRobinStrategy::new()),
        0,
    );
    let counter = Arc::new(AtomicU32::new(0));

    {
        let counter = counter.clone();
        runtime
            .run(move || {
                exercise_every_point();
                let ready = Signal::new();
                let worker = {
                    let ready = ready.clone();
                    let counter = counter.clone();
                    task::spawn(move || {
                        exercise_every_point();
                        counter.fetch_add(1, Ordering::SeqCst);
                        ready.set();
                    })
                };
                ready.wait();
                assert_eq!(ensure_controlled(&worker, "task::spawn"), Ok(()));
                worker.join().expect("worker failed");
                assert_eq!(wrap(async { 3 }).wait(), 3);
                assert_always!(counter.load(Ordering::SeqCst) == 1, "worker ran once");
            })
            .expect("iteration failed");
    }

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(runtime.registry_len(), 0);
    assert!(runtime.trace().is_empty());
    assert_eq!(runtime.suppression_depth(), 0);
}

#[test]
fn test_unbound_thread_is_passthrough() {
    exercise_every_point();
    assert!(Runtime::current().is_none());
}

#[test]
fn test_production_engine_reports_no_decisions() {
    let report = TestEngine::new()
        .policy(SchedulingPolicy::Production)
        .set_iterations(3)
        .set_base_seed(3)
        .run(exercise_every_point)
        .expect("internal error");

    assert!(report.is_success());
    assert_eq!(report.total_decisions, 0);
    assert!(report
        .iteration_reports
        .iter()
        .all(|iteration| iteration.operations.is_empty()));
}
