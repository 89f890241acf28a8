//! Integration tests for terms and clauses

use tessera_foundation::{Clause, Term, TermKind, clause};

// =============================================================================
// Term Kinds
// =============================================================================

#[test]
fn term_kinds() {
    assert_eq!(Term::from("hello").kind(), TermKind::Literal);
    assert_eq!(Term::from("/x/").kind(), TermKind::Variable("x"));
    assert_eq!(Term::from("/...rest/").kind(), TermKind::Rest("rest"));
    assert_eq!(Term::from("/someone/").kind(), TermKind::NonCapturing);
    assert_eq!(Term::from("/anything/").kind(), TermKind::NonCapturing);
}

#[test]
fn slash_edge_cases_are_literals() {
    assert_eq!(Term::from("//").kind(), TermKind::Literal);
    assert_eq!(Term::from("/a/b/").kind(), TermKind::Literal);
    assert_eq!(Term::from("/").kind(), TermKind::Literal);
    assert_eq!(Term::from("x/").kind(), TermKind::Literal);
}

#[test]
fn terms_compare_by_bytes() {
    assert_eq!(Term::from("abc"), Term::new(String::from("abc")));
    assert_ne!(Term::from("abc"), Term::from("ABC"));
    assert_eq!(Term::from("abc"), "abc");
}

// =============================================================================
// Clauses
// =============================================================================

#[test]
fn parse_and_display_round_trip() {
    let c = Clause::parse("the  time is\t3");
    assert_eq!(c.len(), 4);
    assert_eq!(c.to_string(), "the time is 3");
}

#[test]
fn macro_matches_parse() {
    assert_eq!(clause!["a", "/b/", "c"], Clause::parse("a /b/ c"));
    assert_eq!(clause![], Clause::empty());
}

#[test]
fn clause_variables() {
    assert!(Clause::parse("the time is /t/").has_variables());
    assert!(!Clause::parse("the time is 3").has_variables());
}

#[test]
fn slices_share_terms() {
    let c = Clause::parse("Omar claims the time is 3");
    assert_eq!(c.slice(2..c.len()), Clause::parse("the time is 3"));
    assert!(c.term_is(1, "claims"));
    assert!(!c.term_is(9, "claims"));
}
