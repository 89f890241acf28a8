//! Hold registers driving rules.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tessera_engine::{Db, WorkItem};
use tessera_foundation::DbConfig;

use crate::{c, drain, say_with, when};

#[test]
fn replacing_a_hold_swaps_derived_facts() {
    let db = Db::new(DbConfig::small());
    let items = db.assert(&when("the time is /n/", "{}")).unwrap().1;
    drain(&db, items, say_with("tick"));

    let first = db.hold("clock", 1, &c("the time is 1"), None).unwrap();
    drain(&db, first.reactions, say_with("tick"));
    assert!(db.lookup_literal(&c("tick 1")).is_some());

    let second = db.hold("clock", 2, &c("the time is 2"), None).unwrap();
    drain(&db, second.reactions, say_with("tick"));
    assert!(db.lookup_literal(&c("tick 2")).is_some());
    assert_eq!(db.lookup_literal(&c("tick 1")), None);
    assert_eq!(db.lookup_literal(&c("the time is 1")), None);
}

#[test]
fn new_value_is_visible_before_old_is_removed() {
    let db = Db::new(DbConfig::small());
    let first = db.hold("k", 1, &c("v 1"), None).unwrap();
    let second = db.hold("k", 2, &c("v 2"), None).unwrap();
    assert!(matches!(second.reactions.last(), Some(WorkItem::RemoveParent(r)) if *r == first.statement));
    assert!(db.lookup_literal(&c("v 2")).is_some());
    assert!(db.statement_clause(first.statement).is_some());
}

#[test]
fn stale_versions_are_ignored() {
    let db = Db::new(DbConfig::small());
    db.hold("k", 10, &c("v 10"), None).unwrap();
    let stale = db.hold("k", 4, &c("v 4"), None).unwrap();
    assert!(!stale.changed);
    assert_eq!(stale.version, 10);
    assert!(stale.reactions.is_empty());
    assert_eq!(db.lookup_literal(&c("v 4")), None);
}

#[test]
fn destructor_is_queued_as_callback() {
    let db = Db::new(DbConfig::small());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let first = db
        .hold(
            "k",
            1,
            &c("v 1"),
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();
    drain(&db, first.reactions, |_| Vec::new());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let second = db.hold("k", 2, &c("v 2"), None).unwrap();
    drain(&db, second.reactions, |_| Vec::new());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
