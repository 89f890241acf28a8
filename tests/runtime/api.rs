//! The evaluator-facing API: holds, acquire/release, timed removal.

use std::thread;
use std::time::{Duration, Instant};

use tessera_foundation::{AnyRef, Capacity, ErrorKind};
use tessera_runtime::{NoopEvaluator, Runtime, RuntimeConfig};

use crate::{IDLE, c};

#[test]
fn acquire_keeps_removed_statement_readable() {
    let runtime = Runtime::start(RuntimeConfig::testing(), NoopEvaluator).unwrap();
    let r = runtime.hold("k", 1, c("pinned value"), None).unwrap();
    runtime.acquire(r).unwrap();

    runtime.hold("k", 2, c("next value"), None).unwrap();
    assert!(runtime.wait_idle(IDLE));
    assert_eq!(runtime.db().statement_clause(r), Some(c("pinned value")));
    assert_eq!(runtime.db().lookup_literal(&c("pinned value")), None);

    runtime.release(r).unwrap();
    assert_eq!(runtime.db().statement_clause(r), None);
    let err = runtime.release(AnyRef::Statement(r)).unwrap_err();
    assert!(err.is_stale());
}

#[test]
fn hold_versions_are_monotonic() {
    let runtime = Runtime::start(RuntimeConfig::testing(), NoopEvaluator).unwrap();
    let newest = runtime.hold("k", 5, c("v 5"), None).unwrap();
    let ignored = runtime.hold("k", 3, c("v 3"), None).unwrap();
    assert_eq!(ignored, newest);
    assert!(runtime.wait_idle(IDLE));
    assert_eq!(runtime.db().held("k"), Some((5, newest)));
}

#[test]
fn remove_later_table_is_bounded() {
    let config = RuntimeConfig::testing().with_remove_later_capacity(1);
    let runtime = Runtime::start(config, NoopEvaluator).unwrap();
    let r = runtime.hold("k", 1, c("v"), None).unwrap();
    runtime.remove_later(r, Duration::from_secs(60)).unwrap();
    let err = runtime.remove_later(r, Duration::from_secs(60)).unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::CapacityExhausted(Capacity::RemoveLater { limit: 1 })
    ));
}

#[test]
fn remove_later_expires_assertion() {
    let runtime = Runtime::start(RuntimeConfig::testing(), NoopEvaluator).unwrap();
    runtime.assert(c("short lived"));
    assert!(runtime.wait_idle(IDLE));
    let r = runtime.db().lookup_literal(&c("short lived")).unwrap();
    runtime.remove_later(r, Duration::from_millis(10)).unwrap();

    let deadline = Instant::now() + IDLE;
    while runtime.db().lookup_literal(&c("short lived")).is_some() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(runtime.db().lookup_literal(&c("short lived")), None);
}
