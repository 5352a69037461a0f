//! Finding a lost update and replaying it from the bug report.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use turnstile::{
    assert_always, scheduling_point, task, SchedulingError, StrategyKind, TestEngine,
};

/// Two unsynchronized read-modify-write increments.
fn lost_update() {
    let counter = Arc::new(AtomicU32::new(0));
    let workers: Vec<_> = (0..2)
        .map(|_| {
            let counter = counter.clone();
            task::spawn(move || {
                scheduling_point::read("counter");
                let seen = counter.load(Ordering::SeqCst);
                scheduling_point::write("counter");
                counter.store(seen + 1, Ordering::SeqCst);
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker failed");
    }
    assert_always!(
        counter.load(Ordering::SeqCst) == 2,
        "both increments must be visible"
    );
}

#[test]
fn test_random_exploration_finds_lost_update() {
    let report = TestEngine::new()
        .strategy_kind(StrategyKind::Random)
        .set_iterations(200)
        .set_base_seed(2024)
        .run(lost_update)
        .expect("internal error");

    let bug = report.bug.clone().expect("lost update not found");
    assert_eq!(
        bug.error,
        SchedulingError::AssertionViolation(
            "both increments must be visible (in op(0))".to_string()
        )
    );
    assert_eq!(report.seeds_failing, vec![bug.seed]);
    assert!(report.to_string().contains("=== Bug Found ==="));

    let replayed = TestEngine::replay(&bug)
        .run(lost_update)
        .expect("internal error");
    let again = replayed.bug.expect("replay did not reproduce the bug");
    assert_eq!(again.error, bug.error);
    assert_eq!(again.trace, bug.trace);
}

#[test]
fn test_round_robin_interleaves_the_increments() {
    // Round-robin alternates at every access, which is exactly the lost update.
    let report = TestEngine::new()
        .strategy_kind(StrategyKind::RoundRobin)
        .set_iterations(1)
        .run(lost_update)
        .expect("internal error");

    let bug = report.bug.expect("round-robin should interleave the increments");
    assert_eq!(
        bug.trace.to_string(),
        "0:join>1 -> 1:read(counter)>2 -> 2:read(counter)>1 -> 1:write(counter)>2 \
         -> 2:write(counter)>1 -> 1:complete>2 -> 2:complete>0"
    );
}
