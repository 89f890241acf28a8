//! Transitive teardown when a premise is retracted.

use tessera_engine::Db;
use tessera_foundation::DbConfig;

use crate::{c, drain, when};

fn chain(db: &Db) {
    let mut items = Vec::new();
    for (from, to) in [("a", "b"), ("b", "c"), ("c", "d")] {
        items.extend(db.assert(&when(&format!("{from} /n/"), to)).unwrap().1);
    }
    items.extend(db.assert(&c("a 1")).unwrap().1);
    drain(db, items, |activation| {
        let n = activation.bindings.term("n").unwrap();
        vec![c(&format!("{} {n}", activation.body))]
    });
}

#[test]
fn retraction_removes_derived_chain() {
    let db = Db::new(DbConfig::small());
    chain(&db);
    for fact in ["b 1", "c 1", "d 1"] {
        assert!(db.lookup_literal(&c(fact)).is_some(), "{fact} missing");
    }
    let matches_before = db.match_count();
    assert_eq!(matches_before, 3);

    let items = db.retract(&c("a 1")).unwrap();
    drain(&db, items, |_| Vec::new());

    for fact in ["a 1", "b 1", "c 1", "d 1"] {
        assert_eq!(db.lookup_literal(&c(fact)), None, "{fact} survived");
    }
    assert_eq!(db.match_count(), 0);
    assert_eq!(db.indexed_count(), 3);
}

#[test]
fn retracting_a_rule_removes_its_output() {
    let db = Db::new(DbConfig::small());
    chain(&db);
    let items = db.retract(&when("b /n/", "c")).unwrap();
    drain(&db, items, |_| Vec::new());

    assert!(db.lookup_literal(&c("b 1")).is_some());
    assert_eq!(db.lookup_literal(&c("c 1")), None);
    assert_eq!(db.lookup_literal(&c("d 1")), None);
}

#[test]
fn independently_asserted_fact_survives() {
    let db = Db::new(DbConfig::small());
    chain(&db);
    let (c1, _) = db.assert(&c("c 1")).unwrap();
    assert_eq!(db.parent_count(c1), Some(2));

    let items = db.retract(&c("a 1")).unwrap();
    drain(&db, items, |_| Vec::new());

    assert_eq!(db.lookup_literal(&c("b 1")), None);
    assert_eq!(db.lookup_literal(&c("c 1")), Some(c1));
    assert_eq!(db.parent_count(c1), Some(1));
    assert!(db.lookup_literal(&c("d 1")).is_some());
}

#[test]
fn retracting_derived_fact_leaves_it_to_its_match() {
    let db = Db::new(DbConfig::small());
    chain(&db);
    let b1 = db.lookup_literal(&c("b 1")).unwrap();

    let items = db.retract(&c("b /n/")).unwrap();
    assert!(items.is_empty());
    assert_eq!(db.lookup_literal(&c("b 1")), Some(b1));
    assert!(db.lookup_literal(&c("d 1")).is_some());
    assert_eq!(db.match_count(), 3);
}
