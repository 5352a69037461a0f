//! Round-robin end-to-end scenarios.

use std::sync::Arc;

use turnstile::{
    scheduling_point, task, OperationId, RoundRobinStrategy, Runtime, SchedulingPointType,
    SchedulingPolicy,
};

fn round_robin_runtime() -> Arc<Runtime> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
    Runtime::new(
        SchedulingPolicy::Systematic,
        Box::new(RoundRobinStrategy::new()),
        0,
    )
}

#[test]
fn test_three_operations_interleave_in_creation_order() {
    let runtime = round_robin_runtime();

    runtime
        .run(|| {
            let workers: Vec<_> = ["A", "B", "C"]
                .into_iter()
                .map(|name| task::spawn_named(name, scheduling_point::interleave))
                .collect();
            for worker in workers {
                worker.join().expect("worker failed");
            }
        })
        .expect("iteration failed");

    let (a, b, c) = (OperationId::new(1), OperationId::new(2), OperationId::new(3));
    let trace = runtime.trace();
    assert_eq!(
        trace.operations_at(SchedulingPointType::Interleave),
        vec![a, b, c]
    );
    assert_eq!(
        trace.to_string(),
        "0:join>1 -> 1:interleave>2 -> 2:interleave>3 -> 3:interleave>1 \
         -> 1:complete>2 -> 2:complete>3 -> 3:complete>0 -> 0:complete"
    );

    let operations = runtime.operations();
    assert_eq!(operations.len(), 4);
    assert!(operations.iter().all(|op| op.status().is_completed()));
    let names: Vec<&str> = operations.iter().map(|op| op.name()).collect();
    assert_eq!(names, vec!["root", "A", "B", "C"]);
    assert_eq!(runtime.failure(), None);
}

#[test]
fn test_join_on_completed_operation_does_not_switch() {
    let runtime = round_robin_runtime();

    runtime
        .run(|| {
            let worker = task::spawn(|| 5);
            // Hand the turn to the worker, which completes before we resume.
            scheduling_point::interleave();
            assert!(worker.is_finished());
            assert_eq!(worker.join().expect("worker failed"), 5);
        })
        .expect("iteration failed");

    assert_eq!(
        runtime.trace().to_string(),
        "0:interleave>1 -> 1:complete>0 -> 0:complete"
    );
}

#[test]
fn test_spawned_operations_record_their_parent() {
    let runtime = round_robin_runtime();
    let inner = runtime.clone();

    runtime
        .run(move || {
            let child = task::spawn(|| {
                let grandchild = task::spawn(|| scheduling_point::current_operation());
                grandchild.join().expect("grandchild failed")
            });
            let grandchild = child.join().expect("child failed").expect("no operation");
            assert_eq!(
                inner.ancestors(grandchild),
                vec![OperationId::new(1), OperationId::new(0)]
            );
        })
        .expect("iteration failed");

    let operations = runtime.operations();
    assert_eq!(operations[1].parent(), Some(OperationId::new(0)));
    assert_eq!(operations[2].parent(), Some(OperationId::new(1)));
}
