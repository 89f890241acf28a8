//! End-to-end rule evaluation through the runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tessera_engine::{RuleKind, rule};
use tessera_runtime::{EvalOutcome, Firing, Handle, Runtime, RuntimeConfig};

use crate::{IDLE, c};

/// Says `<body> <n>` for every firing that binds `/n/`.
fn relay(firing: &Firing<'_>, handle: &Handle) -> EvalOutcome {
    if let Some(n) = firing.bindings.term("n") {
        handle.say(c(&format!("{} {n}", firing.body)));
    }
    EvalOutcome::Completed
}

#[test]
fn derived_chain_builds_and_collapses() {
    let runtime = Runtime::start(RuntimeConfig::testing(), relay).unwrap();
    runtime.assert(rule(RuleKind::When, &c("a /n/"), "b", "{}"));
    runtime.assert(rule(RuleKind::When, &c("b /n/"), "c", "{}"));
    for n in 0..10 {
        runtime.assert(c(&format!("a {n}")));
    }
    assert!(runtime.wait_idle(IDLE));
    assert_eq!(runtime.query(&c("c /n/"), false).unwrap().len(), 10);

    runtime.retract(c("a /n/"));
    assert!(runtime.wait_idle(IDLE));
    assert!(runtime.query(&c("b /n/"), false).unwrap().is_empty());
    assert!(runtime.query(&c("c /n/"), false).unwrap().is_empty());
    assert_eq!(runtime.db().match_count(), 0);
}

#[test]
fn each_pair_fires_once_under_concurrency() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let evaluator = move |_: &Firing<'_>, _: &Handle| {
        counter.fetch_add(1, Ordering::SeqCst);
        EvalOutcome::Completed
    };
    let config = RuntimeConfig::testing()
        .with_scheduler(tessera_foundation::SchedulerConfig::fixed(4));
    let runtime = Runtime::start(config, evaluator).unwrap();

    for n in 0..50 {
        runtime.assert(c(&format!("x {n}")));
        if n == 25 {
            runtime.assert(rule(RuleKind::When, &c("x /n/"), "{}", "{}"));
        }
    }
    assert!(runtime.wait_idle(IDLE));
    assert_eq!(fired.load(Ordering::SeqCst), 50);
}

#[test]
fn notify_runs_subscribers_without_storing() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let evaluator = move |firing: &Firing<'_>, _: &Handle| {
        assert_eq!(firing.kind, RuleKind::Subscribe);
        assert_eq!(firing.match_ref, None);
        counter.fetch_add(1, Ordering::SeqCst);
        EvalOutcome::Completed
    };
    let runtime = Runtime::start(RuntimeConfig::testing(), evaluator).unwrap();
    runtime.assert(rule(RuleKind::Subscribe, &c("button /b/ pressed"), "{}", "{}"));
    assert!(runtime.wait_idle(IDLE));

    runtime.notify(c("button 1 pressed"));
    runtime.notify(c("button 2 released"));
    assert!(runtime.wait_idle(IDLE));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(runtime.query(&c("button /b/ pressed"), false).unwrap().is_empty());
}

#[test]
fn failing_bodies_are_not_fatal() {
    let evaluator = |_: &Firing<'_>, _: &Handle| EvalOutcome::Failed("boom".to_string());
    let runtime = Runtime::start(RuntimeConfig::testing(), evaluator).unwrap();
    runtime.assert(rule(RuleKind::When, &c("x /n/"), "{}", "{}"));
    runtime.assert(c("x 1"));
    assert!(runtime.wait_idle(IDLE));
    runtime.assert(c("still alive"));
    assert!(runtime.wait_idle(IDLE));
    assert!(runtime.db().lookup_literal(&c("still alive")).is_some());
}
