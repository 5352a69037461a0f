//! Assertion failures and panics inside controlled operations.

use std::sync::Arc;

use turnstile::{
    assert_always, scheduling_point, task, RoundRobinStrategy, Runtime, SchedulingError,
    SchedulingPolicy, TestEngine,
};

fn round_robin_runtime() -> Arc<Runtime> {
    Runtime::new(
        SchedulingPolicy::Systematic,
        Box::new(RoundRobinStrategy::new()),
        0,
    )
}

#[test]
fn test_assert_always_success() {
    let report = TestEngine::new()
        .set_iterations(3)
        .set_base_seed(1)
        .run(|| {
            let worker = task::spawn(|| {
                scheduling_point::interleave();
                assert_always!(1 + 1 == 2, "Basic arithmetic must hold");
            });
            worker.join().expect("worker failed");
        })
        .expect("internal error");

    assert_eq!(report.failed_runs, 0);
    assert_eq!(report.successful_runs, 3);
}

#[test]
fn test_assert_always_failure_aborts_iteration() {
    let runtime = round_robin_runtime();

    let err = runtime
        .run(|| {
            let worker = task::spawn(|| {
                assert_always!(false, "This will fail");
                unreachable!("assertion failure must unwind the operation");
            });
            let _ = worker.join();
            unreachable!("root must be canceled while joining");
        })
        .expect_err("iteration should fail");

    assert_eq!(
        err,
        SchedulingError::AssertionViolation("This will fail (in op(1))".to_string())
    );
    // The trace ends at the decision that handed the turn to the failing operation.
    assert_eq!(runtime.trace().to_string(), "0:join>1");
    assert!(!runtime.operations()[1].status().is_completed());
}

#[test]
fn test_panic_in_operation_is_a_violation() {
    let runtime = round_robin_runtime();

    let err = runtime
        .run(|| {
            let worker = task::spawn(|| panic!("boom"));
            let _ = worker.join();
        })
        .expect_err("iteration should fail");

    assert_eq!(
        err,
        SchedulingError::AssertionViolation("op(1) panicked: boom".to_string())
    );
}

#[test]
fn test_first_violation_is_reported() {
    let report = TestEngine::new()
        .set_iterations(5)
        .set_base_seed(8)
        .run(|| {
            let worker = task::spawn(|| assert_always!(false, "first"));
            let _ = worker.join();
            assert_always!(false, "second");
        })
        .expect("internal error");

    assert_eq!(report.iterations, 1);
    let bug = report.bug.expect("bug expected");
    assert_eq!(
        bug.error,
        SchedulingError::AssertionViolation("first (in op(1))".to_string())
    );
    assert!(bug.to_string().contains("Kind: AssertionViolation"));
}
