//! Integration tests for Layer 2: Engine
//!
//! Tests for reactive propagation, cascading teardown, holds, and
//! concurrent use of the database.

mod cascade;
mod concurrency;
mod holds;

use std::collections::VecDeque;

use tessera_engine::{Activation, Db, RuleKind, WorkItem, rule};
use tessera_foundation::Clause;

pub fn c(text: &str) -> Clause {
    Clause::parse(text)
}

pub fn when(pattern: &str, body: &str) -> Clause {
    rule(RuleKind::When, &c(pattern), body, "{}")
}

/// Runs work items to completion on the calling thread.
///
/// Each `when` body is simulated by `body`, which returns the clauses the
/// body says. Returns how many bodies ran.
pub fn drain<F>(db: &Db, items: Vec<WorkItem>, body: F) -> usize
where
    F: Fn(&Activation<'_>) -> Vec<Clause>,
{
    let mut queue: VecDeque<WorkItem> = items.into();
    let mut ran = 0;
    while let Some(item) = queue.pop_front() {
        let more = match item {
            WorkItem::Assert(clause) => db.assert(&clause).unwrap().1,
            WorkItem::Retract(pattern) => db.retract(&pattern).unwrap(),
            WorkItem::Hold {
                key,
                version,
                clause,
                destructor,
            } => db.hold(&key, version, &clause, destructor).unwrap().reactions,
            WorkItem::Say { parent, clause } => db
                .say(parent, &clause)
                .unwrap()
                .map(|(_, r)| r)
                .unwrap_or_default(),
            WorkItem::RunWhen(firing) => match db.begin_when(&firing).unwrap() {
                Some(activation) => {
                    ran += 1;
                    let m = activation.match_ref().unwrap();
                    body(&activation)
                        .into_iter()
                        .map(|clause| WorkItem::Say { parent: m, clause })
                        .collect()
                }
                None => Vec::new(),
            },
            WorkItem::RunSubscribe(_) => {
                ran += 1;
                Vec::new()
            }
            WorkItem::RemoveParent(r) => db.remove_parent(r),
            WorkItem::Callback(f) => {
                f();
                Vec::new()
            }
        };
        queue.extend(more);
    }
    ran
}

/// A body that says `<prefix> <value of /n/>`.
pub fn say_with(prefix: &'static str) -> impl Fn(&Activation<'_>) -> Vec<Clause> {
    move |activation: &Activation<'_>| {
        activation
            .bindings
            .term("n")
            .map(|n| vec![c(&format!("{prefix} {n}"))])
            .unwrap_or_default()
    }
}
