//! Integration tests for the persistent pattern index

use tessera_foundation::{Clause, StatementRef};
use tessera_storage::Trie;

fn c(text: &str) -> Clause {
    Clause::parse(text)
}

fn s(i: u32) -> StatementRef {
    StatementRef::new(i, 0)
}

fn sorted(mut v: Vec<StatementRef>) -> Vec<StatementRef> {
    v.sort();
    v
}

fn sample() -> Trie<StatementRef> {
    Trie::new()
        .add(&c("the time is 3"), s(1))
        .add(&c("the time is 4"), s(2))
        .add(&c("the date is 4"), s(3))
        .add(&c("Omar claims the time is 3"), s(4))
        .add(&c("when the time is /t/ {body} in environment {}"), s(5))
}

// =============================================================================
// Lookup
// =============================================================================

#[test]
fn variable_matches_any_single_term() {
    let trie = sample();
    assert_eq!(sorted(trie.lookup(&c("the time is /t/"))), vec![s(1), s(2)]);
    assert_eq!(sorted(trie.lookup(&c("the /what/ is 4"))), vec![s(2), s(3)]);
}

#[test]
fn rest_variable_takes_the_tail() {
    let trie = sample();
    assert_eq!(sorted(trie.lookup(&c("the /...rest/"))), vec![s(1), s(2), s(3)]);
    assert_eq!(trie.lookup(&c("Omar claims /...what/")), vec![s(4)]);
}

#[test]
fn stored_variables_match_from_the_other_side() {
    let trie = sample();
    let found = trie.lookup(&c("when the time is 9 /__body/ in environment /__env/"));
    assert_eq!(found, vec![s(5)]);
}

#[test]
fn lengths_must_agree_without_rest() {
    let trie = sample();
    assert!(trie.lookup(&c("the time is")).is_empty());
    assert!(trie.lookup(&c("the time is 3 now")).is_empty());
}

#[test]
fn literal_lookup_ignores_variables() {
    let trie = sample();
    assert_eq!(trie.lookup_literal(&c("the time is 3")), Some(s(1)));
    assert_eq!(trie.lookup_literal(&c("the time is /t/")), None);
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn old_roots_are_unchanged() {
    let before = sample();
    let (after, removed) = before.remove(&c("the time is 3"));
    assert_eq!(removed, Some(s(1)));
    assert_eq!(before.len(), 5);
    assert_eq!(after.len(), 4);
    assert_eq!(before.lookup_literal(&c("the time is 3")), Some(s(1)));
    assert_eq!(after.lookup_literal(&c("the time is 3")), None);
}

#[test]
fn remove_if_checks_current_value() {
    let trie = sample();
    let (same, removed) = trie.remove_if(&c("the time is 3"), |v| *v == s(99));
    assert_eq!(removed, None);
    assert_eq!(same.len(), 5);
}
