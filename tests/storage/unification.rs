//! Integration tests for clause unification

use tessera_foundation::{Clause, ErrorKind, Term};
use tessera_storage::{Binding, unify};

fn c(text: &str) -> Clause {
    Clause::parse(text)
}

#[test]
fn pattern_binds_data() {
    let env = unify(&c("the time is /t/"), &c("the time is 3"), 8)
        .unwrap()
        .unwrap();
    assert_eq!(env.term("t"), Some(&Term::from("3")));
}

#[test]
fn literal_mismatch_fails_cleanly() {
    assert_eq!(unify(&c("the time is /t/"), &c("the date is 3"), 8).unwrap(), None);
    assert_eq!(unify(&c("a b"), &c("a b c"), 8).unwrap(), None);
}

#[test]
fn rest_binds_remaining_terms() {
    let env = unify(&c("/x/ claims /...rest/"), &c("Omar claims the time is 3"), 8)
        .unwrap()
        .unwrap();
    assert_eq!(env.term("x"), Some(&Term::from("Omar")));
    assert_eq!(
        env.get("rest"),
        Some(&Binding::Rest(c("the time is 3").terms().to_vec()))
    );
}

#[test]
fn non_capturing_binds_nothing() {
    let env = unify(&c("/someone/ claims /x/"), &c("Omar claims hi"), 8)
        .unwrap()
        .unwrap();
    assert_eq!(env.len(), 1);
    assert_eq!(env.get("someone"), None);
}

#[test]
fn repeated_variable_must_agree() {
    assert!(unify(&c("/x/ is /x/"), &c("a is a"), 8).unwrap().is_some());
    assert!(unify(&c("/x/ is /x/"), &c("a is b"), 8).unwrap().is_none());
}

#[test]
fn substitution_fills_pattern() {
    let env = unify(&c("/who/ says /...words/"), &c("Omar says hello there"), 8)
        .unwrap()
        .unwrap();
    assert_eq!(
        env.substitute(&c("reply to /who/ : /...words/")),
        c("reply to Omar : hello there")
    );
}

#[test]
fn binding_limit_is_enforced() {
    let err = unify(&c("/a/ /b/ /c/"), &c("1 2 3"), 2).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TooManyBindings(2)));
}
