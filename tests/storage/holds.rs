//! Integration tests for hold registers

use std::sync::Arc;
use std::thread;

use tessera_foundation::StatementRef;
use tessera_storage::{HoldOutcome, HoldTable};

fn s(i: u32) -> StatementRef {
    StatementRef::new(i, 0)
}

#[test]
fn versions_only_move_forward() {
    let table = HoldTable::new(2);
    table.update("k", 2, |_| Ok(s(2))).unwrap();
    let stale = table.update("k", 1, |_| Ok(s(1))).unwrap();
    assert_eq!(stale, HoldOutcome::Unchanged { current: s(2), version: 2 });
    let next = table.update("k", -1, |_| Ok(s(3))).unwrap();
    assert_eq!(next.statement(), s(3));
    assert_eq!(table.get("k"), Some((3, s(3))));
}

#[test]
fn racing_writers_never_regress() {
    let table = Arc::new(HoldTable::new(1));
    let handles: Vec<_> = (1..=4u32)
        .map(|t| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                let mut last = 0;
                for v in 0..100u32 {
                    let version = i64::from(v * 4 + t);
                    let out = table.update("k", version, |_| Ok(s(v * 4 + t))).unwrap();
                    let stored = match out {
                        HoldOutcome::Replaced { version, .. } | HoldOutcome::Unchanged { version, .. } => version,
                    };
                    assert!(stored >= last);
                    last = stored;
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(table.get("k").map(|(v, _)| v), Some(400));
}
