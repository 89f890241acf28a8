//! The database: statement and match pools, the pattern index, and holds.
//!
//! Every mutation returns the work it triggered instead of running it.
//! Rule bodies are never evaluated while the index lock is held; the
//! caller schedules the returned [`WorkItem`]s.
//!
//! Lock order is index, then match children, then statement links. No
//! code path takes them in the other direction.

use std::fmt;

use parking_lot::Mutex;
use tessera_foundation::{
    AnyRef, CancelToken, Clause, DbConfig, Error, MatchRef, Result, StatementRef, Term,
};
use tessera_storage::{
    Acquired, Destructor, EdgeList, Environment, HoldOutcome, HoldTable, Match, Pool, Statement,
    StatementEdge, Trie, unify,
};
use tracing::{debug, trace, warn};

use crate::transforms::{RuleKind, RuleView, subscriptionize, unsubscriptionize};
use crate::work::{SubscribeFiring, WhenFiring, WorkItem};

// =============================================================================
// Results
// =============================================================================

/// One statement matching a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryResult {
    /// The matching statement.
    pub statement: StatementRef,
    /// Its clause.
    pub clause: Clause,
    /// Bindings from unifying the pattern with the clause.
    pub bindings: Environment,
}

/// What a hold did.
#[derive(Debug)]
pub struct HoldReceipt {
    /// The statement now held under the key.
    pub statement: StatementRef,
    /// The statement displaced by this hold, if any.
    pub replaced: Option<StatementRef>,
    /// The version now stored.
    pub version: i64,
    /// False if the stored version was newer and nothing changed.
    pub changed: bool,
    /// Work triggered by the new statement, followed by removal of the old one.
    pub reactions: Vec<WorkItem>,
}

/// A rule firing that is ready to run.
///
/// Holds an acquisition on its match, if it has one, until dropped.
/// Dropping the activation marks the match's body as completed.
pub struct Activation<'a> {
    /// The rule statement.
    pub rule: StatementRef,
    /// The data statement, for `when` firings that have one.
    pub data: Option<StatementRef>,
    /// The body term to evaluate.
    pub body: Term,
    /// The captured environment term.
    pub environment: Term,
    /// Bindings from unifying the pattern with the data clause or event.
    pub bindings: Environment,
    /// The data clause or the notified event.
    pub clause: Option<Clause>,
    matched: Option<Acquired<'a, Match>>,
    cancel: CancelToken,
}

impl Activation<'_> {
    /// The match backing this firing; `None` for subscribe firings.
    #[must_use]
    pub fn match_ref(&self) -> Option<MatchRef> {
        self.matched.as_ref().map(Acquired::reference)
    }

    /// Token that is cancelled if a parent of the match is removed.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Records the worker running this firing.
    pub fn set_worker(&self, worker: Option<usize>) {
        if let Some(matched) = &self.matched {
            matched.set_worker(worker);
        }
    }
}

impl Drop for Activation<'_> {
    fn drop(&mut self) {
        if let Some(matched) = &self.matched {
            matched.set_worker(None);
            matched.complete();
        }
    }
}

impl fmt::Debug for Activation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("rule", &self.rule)
            .field("data", &self.data)
            .field("body", &self.body)
            .field("bindings", &self.bindings)
            .field("match", &self.match_ref())
            .finish_non_exhaustive()
    }
}

struct Inserted {
    statement: StatementRef,
    fresh: bool,
}

/// What sustains a statement being inserted.
enum Sustain<'a> {
    /// A plain assertion, undone by `retract`.
    Premise,
    /// A hold register, undone when the hold is replaced.
    Hold,
    /// A match, together with its locked child list.
    Match(MatchRef, &'a mut EdgeList<StatementRef>),
}

// =============================================================================
// Db
// =============================================================================

/// The reactive fact database.
pub struct Db {
    config: DbConfig,
    statements: Pool<Statement>,
    matches: Pool<Match>,
    index: Mutex<Trie<StatementRef>>,
    holds: HoldTable,
}

impl Default for Db {
    fn default() -> Self {
        Self::new(DbConfig::default())
    }
}

impl Db {
    /// Creates an empty database.
    #[must_use]
    pub fn new(config: DbConfig) -> Self {
        Self {
            statements: Pool::new(config.statement_capacity),
            matches: Pool::new(config.match_capacity),
            index: Mutex::new(Trie::new()),
            holds: HoldTable::new(config.hold_capacity),
            config,
        }
    }

    /// The configuration this database was built with.
    #[must_use]
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Insertion
    // -------------------------------------------------------------------------

    /// Asserts `clause` as a premise.
    ///
    /// If an identical clause is already indexed, that statement gains a
    /// parent and nothing fires. Otherwise a new statement is indexed and
    /// the rules it triggers are returned.
    pub fn assert(&self, clause: &Clause) -> Result<(StatementRef, Vec<WorkItem>)> {
        let mut index = self.index.lock();
        let inserted = self.insert_locked(&mut index, clause, Sustain::Premise)?;
        let reactions = if inserted.fresh {
            self.react_to_new_statement(&index, inserted.statement, clause)
        } else {
            Vec::new()
        };
        Ok((inserted.statement, reactions))
    }

    /// Asserts `clause` sustained by the match `parent`.
    ///
    /// Returns `Ok(None)` if the match is gone or already torn down.
    pub fn say(
        &self,
        parent: MatchRef,
        clause: &Clause,
    ) -> Result<Option<(StatementRef, Vec<WorkItem>)>> {
        let Some(matched) = self.matches.acquire(parent) else {
            debug!(%parent, %clause, "say from a match that is gone");
            return Ok(None);
        };
        let mut index = self.index.lock();
        let mut children = matched.children();
        if matched.should_free() {
            debug!(%parent, %clause, "say from a match being torn down");
            return Ok(None);
        }
        let inserted =
            self.insert_locked(&mut index, clause, Sustain::Match(parent, &mut *children))?;
        drop(children);
        let reactions = if inserted.fresh {
            self.react_to_new_statement(&index, inserted.statement, clause)
        } else {
            Vec::new()
        };
        Ok(Some((inserted.statement, reactions)))
    }

    fn insert_locked(
        &self,
        index: &mut Trie<StatementRef>,
        clause: &Clause,
        sustain: Sustain<'_>,
    ) -> Result<Inserted> {
        if let Some(existing) = index.lookup_literal(clause) {
            let stmt = self
                .statements
                .acquire(existing)
                .filter(|stmt| !stmt.is_removed())
                .ok_or_else(|| {
                    Error::invariant(format!(
                        "indexed statement {existing} for ({clause}) is gone"
                    ))
                })?;
            stmt.add_parent();
            link_sustain(existing, &stmt, sustain);
            trace!(statement = %existing, %clause, parents = stmt.parent_count(), "reused statement");
            return Ok(Inserted {
                statement: existing,
                fresh: false,
            });
        }

        let stmt = self.statements.allocate(Statement::new(
            clause.clone(),
            self.config.initial_edge_capacity,
        ))?;
        let r = stmt.reference();
        link_sustain(r, &stmt, sustain);
        *index = index.add(clause, r);
        trace!(statement = %r, %clause, "inserted statement");
        Ok(Inserted {
            statement: r,
            fresh: true,
        })
    }

    // -------------------------------------------------------------------------
    // Removal
    // -------------------------------------------------------------------------

    /// Withdraws the assertions behind every statement that unifies with
    /// `pattern`, and tears down whatever depended on statements left with
    /// no sustain.
    ///
    /// Sustains from matches and holds are untouched, so a derived or held
    /// statement survives unless it was also asserted directly and nothing
    /// else keeps it. Every candidate is unified before anything changes; an
    /// error leaves the database as it was.
    pub fn retract(&self, pattern: &Clause) -> Result<Vec<WorkItem>> {
        let removed = {
            let mut index = self.index.lock();
            let mut candidates = Vec::new();
            for r in index.lookup(pattern) {
                let Some(stmt) = self.statements.acquire(r) else {
                    warn!(statement = %r, "indexed statement vanished during retract");
                    continue;
                };
                if unify(pattern, stmt.clause(), self.config.max_bindings)?.is_some() {
                    candidates.push(stmt);
                }
            }

            let mut removed = Vec::new();
            for stmt in candidates {
                let r = stmt.reference();
                let premises = stmt.take_premises();
                if premises == 0 {
                    trace!(statement = %r, "nothing asserted to retract");
                    continue;
                }
                match stmt.drop_parents(premises) {
                    Some(0) => {
                        let (next, _) = index.remove_if(stmt.clause(), |v| *v == r);
                        *index = next;
                        stmt.mark_removed();
                        removed.push(stmt);
                    }
                    Some(_) => {}
                    None => warn!(statement = %r, premises, "premise count exceeds parent count"),
                }
            }
            removed
        };

        debug!(%pattern, count = removed.len(), "retracted");
        let mut reactions = Vec::new();
        for stmt in removed {
            self.tear_down(stmt, &mut reactions);
        }
        Ok(reactions)
    }

    /// Drops one sustain from `r`; at zero the statement is deindexed and
    /// everything depending on it is torn down.
    ///
    /// A stale reference is a no-op.
    #[must_use]
    pub fn remove_parent(&self, r: StatementRef) -> Vec<WorkItem> {
        let mut reactions = Vec::new();
        if let Some(stmt) = self.release_parent(r, None) {
            self.tear_down(stmt, &mut reactions);
        }
        reactions
    }

    /// Returns the statement if this call removed its last sustain.
    fn release_parent(&self, r: StatementRef, via: Option<MatchRef>) -> Option<Acquired<'_, Statement>> {
        let stmt = self.statements.acquire(r)?;
        if let Some(m) = via {
            stmt.links().edges.remove(&StatementEdge::Parent(m));
        }
        let mut index = self.index.lock();
        if stmt.drop_parent() != Some(0) {
            return None;
        }
        let (next, _) = index.remove_if(stmt.clause(), |v| *v == r);
        *index = next;
        drop(index);
        stmt.mark_removed();
        Some(stmt)
    }

    /// Cascades the removal of statements through their matches.
    fn tear_down<'a>(&'a self, stmt: Acquired<'a, Statement>, reactions: &mut Vec<WorkItem>) {
        let mut pending = vec![stmt];
        while let Some(stmt) = pending.pop() {
            let r = stmt.reference();
            let (children, parents, destructors) = {
                let mut links = stmt.links();
                let children: Vec<MatchRef> = links.child_matches().collect();
                let parents: Vec<MatchRef> = links.parent_matches().collect();
                (children, parents, std::mem::take(&mut links.destructors))
            };
            debug!(statement = %r, clause = %stmt.clause(), matches = children.len(), "removing statement");

            for m in parents {
                if let Some(parent) = self.matches.acquire(m) {
                    parent.children().remove(&r);
                }
            }
            for m in children {
                for child in self.free_match(m, r) {
                    if let Some(next) = self.release_parent(child, Some(m)) {
                        pending.push(next);
                    }
                }
            }
            reactions.extend(destructors.into_iter().map(WorkItem::Callback));
        }
    }

    /// Marks a match freed, cancels its body, and returns the statements
    /// it was sustaining.
    fn free_match(&self, m: MatchRef, removed_parent: StatementRef) -> Vec<StatementRef> {
        let Some(matched) = self.matches.acquire(m) else {
            return Vec::new();
        };
        if !matched.mark_should_free() {
            return Vec::new();
        }
        if !matched.is_completed() {
            trace!(r#match = %m, worker = ?matched.worker(), "cancelling running body");
            matched.cancel_token().cancel();
        }
        for &p in matched.parents() {
            if p == removed_parent {
                continue;
            }
            if let Some(parent) = self.statements.acquire(p) {
                parent.links().edges.remove(&StatementEdge::Child(m));
            }
        }
        matched.children().take_all()
    }

    // -------------------------------------------------------------------------
    // Matches
    // -------------------------------------------------------------------------

    /// Creates a match sustained by `rule` and `data`.
    ///
    /// Returns `Ok(None)` if either parent is already gone.
    pub fn add_match(
        &self,
        rule: StatementRef,
        data: Option<StatementRef>,
    ) -> Result<Option<Acquired<'_, Match>>> {
        let parents: Vec<StatementRef> = std::iter::once(rule).chain(data).collect();
        let matched = self.matches.allocate(Match::new(
            parents.clone(),
            self.config.initial_edge_capacity,
        ))?;
        let m = matched.reference();

        let mut linked = Vec::with_capacity(parents.len());
        for p in parents {
            let attached = self.statements.acquire(p).is_some_and(|stmt| {
                let mut links = stmt.links();
                if stmt.is_removed() {
                    false
                } else {
                    links.edges.push(StatementEdge::Child(m));
                    true
                }
            });
            if !attached {
                trace!(r#match = %m, parent = %p, "parent gone before match attached");
                matched.mark_should_free();
                for q in linked {
                    if let Some(stmt) = self.statements.acquire(q) {
                        stmt.links().edges.remove(&StatementEdge::Child(m));
                    }
                }
                return Ok(None);
            }
            linked.push(p);
        }
        Ok(Some(matched))
    }

    /// Prepares a `when` firing: re-acquires both parents, unifies, and
    /// creates the match.
    ///
    /// Returns `Ok(None)` if a parent is gone or the pattern no longer
    /// unifies with the data clause.
    pub fn begin_when(&self, firing: &WhenFiring) -> Result<Option<Activation<'_>>> {
        let Some(rule) = self.statements.acquire(firing.rule) else {
            trace!(rule = %firing.rule, "rule gone before firing");
            return Ok(None);
        };
        let Some(view) = RuleView::parse(rule.clause()).filter(|v| v.kind == RuleKind::When) else {
            warn!(rule = %firing.rule, clause = %rule.clause(), "firing names a statement that is not a when rule");
            return Ok(None);
        };

        let (clause, bindings) = match firing.data {
            Some(d) => {
                let Some(data) = self.statements.acquire(d) else {
                    trace!(data = %d, "data statement gone before firing");
                    return Ok(None);
                };
                let Some(bindings) = unify(&firing.pattern, data.clause(), self.config.max_bindings)?
                else {
                    debug!(pattern = %firing.pattern, clause = %data.clause(), "firing no longer unifies");
                    return Ok(None);
                };
                (Some(data.clause().clone()), bindings)
            }
            None => (None, Environment::new()),
        };

        let Some(matched) = self.add_match(firing.rule, firing.data)? else {
            return Ok(None);
        };
        let cancel = matched.cancel_token().clone();
        Ok(Some(Activation {
            rule: firing.rule,
            data: firing.data,
            body: view.body.clone(),
            environment: view.environment.clone(),
            bindings,
            clause,
            matched: Some(matched),
            cancel,
        }))
    }

    /// Prepares a `subscribe` firing. No match is created.
    pub fn begin_subscribe(&self, firing: &SubscribeFiring) -> Result<Option<Activation<'_>>> {
        let Some(rule) = self.statements.acquire(firing.rule) else {
            return Ok(None);
        };
        let Some(view) =
            RuleView::parse(rule.clause()).filter(|v| v.kind == RuleKind::Subscribe)
        else {
            return Ok(None);
        };
        let Some(bindings) = unify(&firing.pattern, &firing.event, self.config.max_bindings)? else {
            return Ok(None);
        };
        Ok(Some(Activation {
            rule: firing.rule,
            data: None,
            body: view.body.clone(),
            environment: view.environment.clone(),
            bindings,
            clause: Some(firing.event.clone()),
            matched: None,
            cancel: CancelToken::new(),
        }))
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Returns every live statement that unifies with `pattern`.
    ///
    /// With `atomic_only`, statements whose only sustains are matches
    /// still running their bodies are left out, so callers never see half
    /// of a body's output.
    pub fn query(&self, pattern: &Clause, atomic_only: bool) -> Result<Vec<QueryResult>> {
        let snapshot = self.index.lock().clone();
        let mut results = Vec::new();
        for r in snapshot.lookup(pattern) {
            let Some(stmt) = self.statements.acquire(r) else {
                continue;
            };
            if stmt.is_removed() || (atomic_only && !self.is_settled(&stmt)) {
                continue;
            }
            if let Some(bindings) = unify(pattern, stmt.clause(), self.config.max_bindings)? {
                results.push(QueryResult {
                    statement: r,
                    clause: stmt.clause().clone(),
                    bindings,
                });
            }
        }
        Ok(results)
    }

    fn is_settled(&self, stmt: &Statement) -> bool {
        let running = stmt
            .links()
            .parent_matches()
            .filter(|m| {
                self.matches
                    .acquire(*m)
                    .is_some_and(|matched| !matched.is_completed())
            })
            .count();
        stmt.parent_count() as usize > running
    }

    /// Returns the `subscribe` firings for an event. Nothing is stored.
    #[must_use]
    pub fn notify(&self, event: &Clause) -> Vec<WorkItem> {
        let snapshot = self.index.lock().clone();
        snapshot
            .lookup(&subscriptionize(event))
            .into_iter()
            .filter_map(|r| {
                let rule = self.statements.acquire(r)?;
                let pattern = unsubscriptionize(rule.clause())?;
                Some(WorkItem::RunSubscribe(SubscribeFiring {
                    rule: r,
                    pattern,
                    event: event.clone(),
                }))
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Holds
    // -------------------------------------------------------------------------

    /// Installs `clause` under `key` if `version` is newer than the stored one.
    ///
    /// The displaced statement is deindexed immediately, but its sustain is
    /// only dropped by the trailing `RemoveParent` item in the receipt, so
    /// rules see the new value before the old one disappears.
    pub fn hold(
        &self,
        key: &str,
        version: i64,
        clause: &Clause,
        destructor: Option<Destructor>,
    ) -> Result<HoldReceipt> {
        let mut reactions = Vec::new();
        let outcome = self.holds.update(key, version, |old| {
            let mut index = self.index.lock();
            let inserted = self.insert_locked(&mut index, clause, Sustain::Hold)?;
            if let Some(old) = old.filter(|&old| old != inserted.statement) {
                if let Some(stmt) = self.statements.acquire(old) {
                    let (next, _) = index.remove_if(stmt.clause(), |v| *v == old);
                    *index = next;
                }
            }
            if let Some(destructor) = destructor {
                if let Some(stmt) = self.statements.acquire(inserted.statement) {
                    stmt.links().destructors.push(destructor);
                }
            }
            if inserted.fresh {
                reactions = self.react_to_new_statement(&index, inserted.statement, clause);
            }
            Ok(inserted.statement)
        })?;

        let receipt = match outcome {
            HoldOutcome::Replaced { old, new, version } => {
                if let Some(old) = old {
                    reactions.push(WorkItem::RemoveParent(old));
                }
                debug!(key, version, statement = %new, %clause, "hold replaced");
                HoldReceipt {
                    statement: new,
                    replaced: old,
                    version,
                    changed: true,
                    reactions,
                }
            }
            HoldOutcome::Unchanged { current, version } => HoldReceipt {
                statement: current,
                replaced: None,
                version,
                changed: false,
                reactions,
            },
        };
        Ok(receipt)
    }

    /// Returns the version and statement held under `key`.
    #[must_use]
    pub fn held(&self, key: &str) -> Option<(i64, StatementRef)> {
        self.holds.get(key)
    }

    // -------------------------------------------------------------------------
    // Pinning
    // -------------------------------------------------------------------------

    /// Acquires an entity on behalf of a caller that cannot hold a guard.
    pub fn pin(&self, r: AnyRef) -> Result<()> {
        match r {
            AnyRef::Statement(s) => self.statements.pin(s),
            AnyRef::Match(m) => self.matches.pin(m),
        }
    }

    /// Releases an acquisition taken with [`pin`](Self::pin).
    pub fn unpin(&self, r: AnyRef) -> Result<()> {
        match r {
            AnyRef::Statement(s) => self.statements.release(s),
            AnyRef::Match(m) => self.matches.release(m),
        }
    }

    /// Acquires a statement for the lifetime of the guard.
    #[must_use]
    pub fn statement(&self, r: StatementRef) -> Option<Acquired<'_, Statement>> {
        self.statements.acquire(r)
    }

    /// Acquires a match for the lifetime of the guard.
    #[must_use]
    pub fn get_match(&self, r: MatchRef) -> Option<Acquired<'_, Match>> {
        self.matches.acquire(r)
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    /// Number of statement slots in use.
    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.statements.live()
    }

    /// Number of match slots in use.
    #[must_use]
    pub fn match_count(&self) -> usize {
        self.matches.live()
    }

    /// Number of indexed clauses.
    #[must_use]
    pub fn indexed_count(&self) -> usize {
        self.index.lock().len()
    }

    /// The indexed statement with exactly this clause.
    #[must_use]
    pub fn lookup_literal(&self, clause: &Clause) -> Option<StatementRef> {
        self.index.lock().lookup_literal(clause)
    }

    /// The clause of a live statement.
    #[must_use]
    pub fn statement_clause(&self, r: StatementRef) -> Option<Clause> {
        self.statements.acquire(r).map(|s| s.clause().clone())
    }

    /// The parent count of a live statement.
    #[must_use]
    pub fn parent_count(&self, r: StatementRef) -> Option<u32> {
        self.statements.acquire(r).map(|s| s.parent_count())
    }

    /// Matches that `r` is a parent of.
    #[must_use]
    pub fn statement_matches(&self, r: StatementRef) -> Option<Vec<MatchRef>> {
        self.statements
            .acquire(r)
            .map(|s| s.links().child_matches().collect())
    }

    /// Statements produced by a live match.
    #[must_use]
    pub fn match_children(&self, m: MatchRef) -> Option<Vec<StatementRef>> {
        self.matches
            .acquire(m)
            .map(|matched| matched.children().iter().collect())
    }

    /// Every indexed statement and its clause.
    #[must_use]
    pub fn statements(&self) -> Vec<(StatementRef, Clause)> {
        let snapshot = self.index.lock().clone();
        snapshot
            .values()
            .into_iter()
            .filter_map(|r| Some((r, self.statements.acquire(r)?.clause().clone())))
            .collect()
    }

    pub(crate) fn acquire_statement(&self, r: StatementRef) -> Option<Acquired<'_, Statement>> {
        self.statements.acquire(r)
    }
}

fn link_sustain(r: StatementRef, stmt: &Statement, sustain: Sustain<'_>) {
    match sustain {
        Sustain::Premise => stmt.note_premise(),
        Sustain::Hold => {}
        Sustain::Match(m, children) => {
            children.push(r);
            stmt.links().edges.push(StatementEdge::Parent(m));
        }
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("statements", &self.statements)
            .field("matches", &self.matches)
            .field("holds", &self.holds.len())
            .finish_non_exhaustive()
    }
}
