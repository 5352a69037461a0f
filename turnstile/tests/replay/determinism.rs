//! Same strategy and seed give the same trace.

use turnstile::{
    scheduling_point, task, DecisionTrace, RandomStrategy, ReplayStrategy, Runtime,
    SchedulingPolicy, Signal, StrategyKind, TestEngine,
};

/// A body with plenty of decisions of every kind.
fn busy_body() {
    let ready = Signal::new();
    let workers: Vec<_> = (0..3)
        .map(|i| {
            let ready = ready.clone();
            task::spawn(move || {
                if i == 0 {
                    scheduling_point::write("flag");
                    ready.set();
                } else {
                    scheduling_point::read("flag");
                    ready.wait();
                }
                for _ in 0..3 {
                    scheduling_point::interleave();
                    scheduling_point::yield_now();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker failed");
    }
}

fn run_random(seed: u64) -> DecisionTrace {
    let runtime = Runtime::new(
        SchedulingPolicy::Systematic,
        Box::new(RandomStrategy::new()),
        seed,
    );
    runtime.run(busy_body).expect("iteration failed");
    runtime.trace()
}

#[test]
fn test_same_seed_same_trace() {
    for seed in [0, 1, 42, u64::MAX] {
        let first = run_random(seed);
        assert!(!first.is_empty());
        assert_eq!(first, run_random(seed), "seed {seed}");
    }
}

#[test]
fn test_engine_runs_are_reproducible() {
    let run = || {
        TestEngine::new()
            .strategy_kind(StrategyKind::Random)
            .set_iterations(10)
            .set_base_seed(1234)
            .run(busy_body)
            .expect("internal error")
    };
    let first = run();
    let second = run();

    assert_eq!(first.seeds_used, second.seeds_used);
    assert_eq!(first.total_decisions, second.total_decisions);
    let traces = |report: &turnstile::TestReport| -> Vec<String> {
        report
            .iteration_reports
            .iter()
            .map(|iteration| iteration.trace.to_string())
            .collect()
    };
    assert_eq!(traces(&first), traces(&second));
}

#[test]
fn test_replay_reproduces_recorded_trace() {
    for seed in 0..5 {
        let recorded = run_random(seed);

        let stored = DecisionTrace::parse(&recorded.to_string()).expect("parse failed");
        let replay = Runtime::new(
            SchedulingPolicy::Systematic,
            Box::new(ReplayStrategy::new(stored)),
            0,
        );
        replay.run(busy_body).expect("iteration failed");
        assert_eq!(replay.trace(), recorded, "seed {seed}");
    }
}

#[test]
fn test_json_trace_replays_too() {
    let recorded = run_random(77);
    let json = recorded.to_json().expect("serialize");
    let stored = DecisionTrace::from_json(&json).expect("deserialize");
    assert_eq!(stored, recorded);

    let report = TestEngine::replay_trace(stored)
        .run(busy_body)
        .expect("internal error");
    assert!(report.is_success());
    assert_eq!(report.iteration_reports[0].trace, recorded);
}
