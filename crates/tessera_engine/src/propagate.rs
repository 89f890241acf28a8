//! Reactions to a newly indexed statement.
//!
//! A statement can trigger rules in three ways:
//!
//! 1. It is itself a `when` rule, and existing statements match its pattern
//!    (or the claimized form of its pattern).
//! 2. Existing `when` rules have patterns matching it.
//! 3. It is a claim, and existing rules match the claimed clause.
//!
//! Reactions are computed under the index lock together with the
//! insertion, so whichever of a rule and its data arrives second sees the
//! first, and each pair fires exactly once.

use tessera_foundation::{Clause, StatementRef};
use tessera_storage::Trie;
use tracing::trace;

use crate::db::Db;
use crate::transforms::{claimize, is_claim, unclaimize, unwhenize, whenize};
use crate::work::{WhenFiring, WorkItem};

impl Db {
    /// Computes the firings caused by inserting `r`.
    ///
    /// `index` must already contain `r`.
    pub(crate) fn react_to_new_statement(
        &self,
        index: &Trie<StatementRef>,
        r: StatementRef,
        clause: &Clause,
    ) -> Vec<WorkItem> {
        let mut firings = Vec::new();

        if let Some(pattern) = unwhenize(clause) {
            if pattern.is_empty() {
                firings.push(WhenFiring {
                    rule: r,
                    pattern,
                    data: None,
                });
            } else {
                for data in index.lookup(&pattern) {
                    firings.push(WhenFiring {
                        rule: r,
                        pattern: pattern.clone(),
                        data: Some(data),
                    });
                }
                if let Some(claimed) = claimize(&pattern) {
                    for data in index.lookup(&claimed) {
                        firings.push(WhenFiring {
                            rule: r,
                            pattern: claimed.clone(),
                            data: Some(data),
                        });
                    }
                }
            }
        }

        self.fire_matching_rules(index, r, &whenize(clause), false, &mut firings);

        if is_claim(clause) {
            if let Some(claimed) = unclaimize(clause) {
                self.fire_matching_rules(index, r, &whenize(&claimed), true, &mut firings);
            }
        }

        trace!(statement = %r, %clause, firings = firings.len(), "reacted to new statement");
        firings.into_iter().map(WorkItem::RunWhen).collect()
    }

    /// Adds a firing for every `when` rule whose pattern matches `data`.
    ///
    /// With `claimized`, the rule's pattern is rewritten to accept the
    /// claimant so it still unifies with the full claim clause.
    fn fire_matching_rules(
        &self,
        index: &Trie<StatementRef>,
        data: StatementRef,
        rule_pattern: &Clause,
        claimized: bool,
        firings: &mut Vec<WhenFiring>,
    ) {
        for rule in index.lookup(rule_pattern) {
            if rule == data {
                continue;
            }
            let Some(stmt) = self.acquire_statement(rule) else {
                continue;
            };
            let Some(pattern) = unwhenize(stmt.clause()) else {
                continue;
            };
            let pattern = if claimized {
                match claimize(&pattern) {
                    Some(pattern) => pattern,
                    None => continue,
                }
            } else {
                pattern
            };
            firings.push(WhenFiring {
                rule,
                pattern,
                data: Some(data),
            });
        }
    }
}
