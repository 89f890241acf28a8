//! Scheduler liveness: every submitted item runs exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tessera_foundation::SchedulerConfig;
use tessera_runtime::{Scheduler, Spawner};

use crate::IDLE;

#[test]
fn items_from_many_threads_run_once() {
    let counts: Arc<Vec<AtomicUsize>> = Arc::new((0..4_000).map(|_| AtomicUsize::new(0)).collect());
    let sink = Arc::clone(&counts);
    let scheduler = Arc::new(
        Scheduler::start(SchedulerConfig::fixed(4), move |n: usize, _: &Spawner<usize>| {
            sink[n].fetch_add(1, Ordering::SeqCst);
        })
        .unwrap(),
    );

    let submitters: Vec<_> = (0..4)
        .map(|t| {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || {
                for n in (t * 1_000)..((t + 1) * 1_000) {
                    scheduler.submit(n);
                }
            })
        })
        .collect();
    for s in submitters {
        s.join().unwrap();
    }
    assert!(scheduler.wait_idle(IDLE));
    assert!(counts.iter().all(|n| n.load(Ordering::SeqCst) == 1));
}

#[test]
fn nested_work_spreads_across_workers() {
    let workers = Arc::new(Mutex::new(std::collections::HashSet::new()));
    let seen = Arc::clone(&workers);
    let scheduler = Scheduler::start(
        SchedulerConfig::fixed(4).with_responsive_threshold(Duration::from_secs(1)),
        move |depth: u32, spawner: &Spawner<u32>| {
            if let Some(w) = spawner.current_worker() {
                seen.lock().insert(w);
            }
            thread::sleep(Duration::from_micros(200));
            if depth > 0 {
                spawner.submit(depth - 1);
                spawner.submit(depth - 1);
            }
        },
    )
    .unwrap();

    scheduler.submit(8);
    assert!(scheduler.wait_idle(IDLE));
    assert!(workers.lock().len() > 1, "no work was stolen");
}

#[test]
fn slow_items_do_not_starve_the_queue() {
    let done = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&done);
    let config = SchedulerConfig::fixed(2).with_global_drain_interval(2);
    let scheduler = Scheduler::start(config, move |slow: bool, _: &Spawner<bool>| {
        if slow {
            thread::sleep(Duration::from_millis(20));
        }
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    scheduler.submit(true);
    for _ in 0..100 {
        scheduler.submit(false);
    }
    assert!(scheduler.wait_idle(IDLE));
    assert_eq!(done.load(Ordering::SeqCst), 101);
}
