//! Only the operation holding the turn ever runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use turnstile::{scheduling_point, task, StrategyKind, TestEngine};

fn critical_section(running: &AtomicUsize, max_running: &AtomicUsize) {
    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
    max_running.fetch_max(now, Ordering::SeqCst);
    // Give a racing OS thread every chance to show up.
    thread::yield_now();
    running.fetch_sub(1, Ordering::SeqCst);
}

fn check_mutual_exclusion(kind: StrategyKind) {
    let running = Arc::new(AtomicUsize::new(0));
    let max_running = Arc::new(AtomicUsize::new(0));

    let report = {
        let running = running.clone();
        let max_running = max_running.clone();
        TestEngine::new()
            .strategy_kind(kind)
            .set_iterations(20)
            .set_base_seed(99)
            .run(move || {
                let workers: Vec<_> = (0..4)
                    .map(|_| {
                        let running = running.clone();
                        let max_running = max_running.clone();
                        task::spawn(move || {
                            for round in 0..5 {
                                critical_section(&running, &max_running);
                                if round % 2 == 0 {
                                    scheduling_point::interleave();
                                } else {
                                    scheduling_point::yield_now();
                                }
                            }
                        })
                    })
                    .collect();
                critical_section(&running, &max_running);
                for worker in workers {
                    worker.join().expect("worker failed");
                }
            })
            .expect("internal error")
    };

    assert!(report.is_success(), "{report}");
    assert_eq!(report.iterations, 20);
    assert_eq!(max_running.load(Ordering::SeqCst), 1);
}

#[test]
fn test_mutual_exclusion_random() {
    check_mutual_exclusion(StrategyKind::Random);
}

#[test]
fn test_mutual_exclusion_round_robin() {
    check_mutual_exclusion(StrategyKind::RoundRobin);
}
