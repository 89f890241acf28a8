//! Cancelling running bodies when their premises are retracted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tessera_engine::{RuleKind, rule};
use tessera_runtime::{EvalOutcome, Firing, Handle, Runtime, RuntimeConfig};

use crate::{IDLE, c};

#[test]
fn retracting_premise_cancels_running_body() {
    let started = Arc::new(AtomicBool::new(false));
    let cancelled = Arc::new(AtomicBool::new(false));
    let (started_flag, cancelled_flag) = (Arc::clone(&started), Arc::clone(&cancelled));

    let evaluator = move |firing: &Firing<'_>, handle: &Handle| {
        handle.say(c("partial output"));
        started_flag.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if firing.check_cancelled().is_err() {
                cancelled_flag.store(true, Ordering::SeqCst);
                return EvalOutcome::Cancelled;
            }
            thread::sleep(Duration::from_millis(1));
        }
        EvalOutcome::Completed
    };
    let runtime = Runtime::start(RuntimeConfig::testing(), evaluator).unwrap();
    runtime.assert(rule(RuleKind::When, &c("job /n/"), "{work}", "{}"));
    runtime.assert(c("job 1"));

    while !started.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));
    }
    runtime.retract(c("job 1"));
    assert!(runtime.wait_idle(IDLE));

    assert!(cancelled.load(Ordering::SeqCst));
    assert_eq!(runtime.db().lookup_literal(&c("partial output")), None);
    assert_eq!(runtime.db().match_count(), 0);
}

#[test]
fn atomic_query_hides_output_of_running_body() {
    let release = Arc::new(AtomicBool::new(false));
    let said = Arc::new(AtomicBool::new(false));
    let (gate, said_flag) = (Arc::clone(&release), Arc::clone(&said));

    let evaluator = move |_: &Firing<'_>, handle: &Handle| {
        let parent = handle.current_match_ref().unwrap();
        handle.db().say(parent, &c("half done")).unwrap();
        said_flag.store(true, Ordering::SeqCst);
        while !gate.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
        EvalOutcome::Completed
    };
    let runtime = Runtime::start(RuntimeConfig::testing(), evaluator).unwrap();
    runtime.assert(rule(RuleKind::When, &c("go /n/"), "{}", "{}"));
    runtime.assert(c("go 1"));
    while !said.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(runtime.query(&c("half done"), false).unwrap().len(), 1);
    assert!(runtime.query(&c("half done"), true).unwrap().is_empty());

    release.store(true, Ordering::SeqCst);
    assert!(runtime.wait_idle(IDLE));
    assert_eq!(runtime.query(&c("half done"), true).unwrap().len(), 1);
}
