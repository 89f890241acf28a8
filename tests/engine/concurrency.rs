//! Concurrent use of a single database.

use std::sync::{Arc, Barrier};
use std::thread;

use tessera_engine::Db;
use tessera_foundation::DbConfig;

use crate::c;

#[test]
fn concurrent_double_assert_dedups() {
    for _ in 0..100 {
        let db = Arc::new(Db::new(DbConfig::small()));
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let db = Arc::clone(&db);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    db.assert(&c("the sky is blue")).unwrap().0
                })
            })
            .collect();
        let refs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(refs[0], refs[1]);
        assert_eq!(db.parent_count(refs[0]), Some(2));
        assert_eq!(db.statement_count(), 1);
    }
}

#[test]
fn concurrent_assert_and_retract_leave_consistent_index() {
    let db = Arc::new(Db::new(DbConfig::default()));
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for i in 0..200 {
                    let clause = c(&format!("item {} {}", t, i % 10));
                    db.assert(&clause).unwrap();
                    if i % 3 == 0 {
                        db.retract(&clause).unwrap();
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for (r, clause) in db.statements() {
        assert_eq!(db.lookup_literal(&clause), Some(r));
        assert!(db.parent_count(r).unwrap() > 0);
    }
    assert_eq!(db.statements().len(), db.indexed_count());
    assert_eq!(db.statement_count(), db.indexed_count());
}
