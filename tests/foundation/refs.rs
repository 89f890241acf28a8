//! Integration tests for generational references

use tessera_foundation::{AnyRef, ErrorKind, MatchRef, StatementRef};

#[test]
fn string_forms() {
    assert_eq!(StatementRef::new(12, 3).to_string(), "s12:3");
    assert_eq!(MatchRef::new(7, 0).to_string(), "m7:0");
}

#[test]
fn parse_round_trip() {
    let s: StatementRef = "s12:3".parse().unwrap();
    assert_eq!(s, StatementRef::new(12, 3));
    let any: AnyRef = "m4:9".parse().unwrap();
    assert_eq!(any, AnyRef::Match(MatchRef::new(4, 9)));
}

#[test]
fn malformed_refs_are_rejected() {
    for bad in ["", "s", "s12", "s12:", "x1:2", "m1:2:3", "s-1:0", "m1:99999999999"] {
        let err = bad.parse::<AnyRef>().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidRef(_)), "{bad:?}");
    }
    assert!("m1:0".parse::<StatementRef>().is_err());
}

#[test]
fn null_ref() {
    assert!(StatementRef::NULL.is_null());
    assert!(!StatementRef::new(1, 0).is_null());
    assert_eq!(format!("{:?}", MatchRef::NULL), "MatchRef(null)");
    assert_eq!(format!("{:?}", StatementRef::new(42, 3)), "StatementRef(42v3)");
}
