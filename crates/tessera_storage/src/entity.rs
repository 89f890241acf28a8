//! Statements and matches: the two kinds of pooled entity.
//!
//! Edges between them are plain references, never owning pointers. A
//! statement lists the matches it sustains (children) and the matches that
//! sustain it (parents); a match lists the statements it produced.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard};
use tessera_foundation::{CancelToken, Capacity, Clause, MatchRef, StatementRef};

use crate::arena::Entity;
use crate::edges::EdgeList;

/// A callback run when a statement is removed.
pub type Destructor = Box<dyn FnOnce() + Send + 'static>;

/// An edge from a statement to a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementEdge {
    /// The match sustains this statement.
    Parent(MatchRef),
    /// This statement is one of the match's parents.
    Child(MatchRef),
}

/// Mutable parts of a [`Statement`], guarded by its own mutex.
#[derive(Default)]
pub struct StatementLinks {
    /// Edges to related matches.
    pub edges: EdgeList<StatementEdge>,
    /// Callbacks to run on removal.
    pub destructors: Vec<Destructor>,
}

impl StatementLinks {
    /// Matches this statement is a parent of.
    pub fn child_matches(&self) -> impl Iterator<Item = MatchRef> + '_ {
        self.edges.iter().filter_map(|e| match e {
            StatementEdge::Child(m) => Some(m),
            StatementEdge::Parent(_) => None,
        })
    }

    /// Matches that sustain this statement.
    pub fn parent_matches(&self) -> impl Iterator<Item = MatchRef> + '_ {
        self.edges.iter().filter_map(|e| match e {
            StatementEdge::Parent(m) => Some(m),
            StatementEdge::Child(_) => None,
        })
    }
}

/// An indexed clause together with the bookkeeping that keeps it alive.
pub struct Statement {
    clause: Clause,
    parents: AtomicU32,
    premises: AtomicU32,
    removed: AtomicBool,
    links: Mutex<StatementLinks>,
}

impl Statement {
    /// Creates a statement sustained by one parent.
    #[must_use]
    pub fn new(clause: Clause, edge_capacity: usize) -> Self {
        Self {
            clause,
            parents: AtomicU32::new(1),
            premises: AtomicU32::new(0),
            removed: AtomicBool::new(false),
            links: Mutex::new(StatementLinks {
                edges: EdgeList::with_capacity(edge_capacity),
                destructors: Vec::new(),
            }),
        }
    }

    /// The stored clause.
    #[must_use]
    pub fn clause(&self) -> &Clause {
        &self.clause
    }

    /// Number of assertions, holds, and matches sustaining this statement.
    #[must_use]
    pub fn parent_count(&self) -> u32 {
        self.parents.load(Ordering::SeqCst)
    }

    /// Adds one sustain.
    pub fn add_parent(&self) {
        self.parents.fetch_add(1, Ordering::SeqCst);
    }

    /// Drops one sustain and returns how many remain.
    ///
    /// Returns `None` if the count was already zero.
    pub fn drop_parent(&self) -> Option<u32> {
        self.parents
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|previous| previous - 1)
    }

    /// Drops `n` sustains at once and returns how many remain.
    ///
    /// Returns `None`, changing nothing, if fewer than `n` are left.
    pub fn drop_parents(&self, n: u32) -> Option<u32> {
        self.parents
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| count.checked_sub(n))
            .ok()
            .map(|previous| previous - n)
    }

    /// Number of sustains that came from plain assertions.
    #[must_use]
    pub fn premise_count(&self) -> u32 {
        self.premises.load(Ordering::SeqCst)
    }

    /// Records that one existing sustain is an assertion.
    pub fn note_premise(&self) {
        self.premises.fetch_add(1, Ordering::SeqCst);
    }

    /// Forgets every assertion sustain and returns how many there were.
    ///
    /// The parent count is left alone; pair with [`drop_parents`](Self::drop_parents).
    pub fn take_premises(&self) -> u32 {
        self.premises.swap(0, Ordering::SeqCst)
    }

    /// Drops every sustain at once and returns how many there were.
    pub fn clear_parents(&self) -> u32 {
        self.parents.swap(0, Ordering::SeqCst)
    }

    /// True once the statement has been taken out of the index.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    /// Marks the statement removed. Returns false if it already was.
    pub fn mark_removed(&self) -> bool {
        !self.removed.swap(true, Ordering::SeqCst)
    }

    /// Locks the statement's edges and destructors.
    pub fn links(&self) -> MutexGuard<'_, StatementLinks> {
        self.links.lock()
    }
}

impl Entity for Statement {
    type Ref = StatementRef;

    fn is_sustained(&self) -> bool {
        self.parent_count() > 0
    }

    fn exhausted(limit: usize) -> Capacity {
        Capacity::StatementPool { limit }
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("clause", &self.clause)
            .field("parents", &self.parent_count())
            .field("premises", &self.premise_count())
            .field("removed", &self.is_removed())
            .finish_non_exhaustive()
    }
}

const NO_WORKER: usize = usize::MAX;

/// One firing of a rule body, bound to the statements that caused it.
pub struct Match {
    parents: Vec<StatementRef>,
    should_free: AtomicBool,
    completed: AtomicBool,
    worker: AtomicUsize,
    cancel: CancelToken,
    children: Mutex<EdgeList<StatementRef>>,
}

impl Match {
    /// Creates a match for the given parent statements.
    #[must_use]
    pub fn new(parents: Vec<StatementRef>, edge_capacity: usize) -> Self {
        Self {
            parents,
            should_free: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            worker: AtomicUsize::new(NO_WORKER),
            cancel: CancelToken::new(),
            children: Mutex::new(EdgeList::with_capacity(edge_capacity)),
        }
    }

    /// The statements whose removal invalidates this match.
    #[must_use]
    pub fn parents(&self) -> &[StatementRef] {
        &self.parents
    }

    /// True once the rule body has finished running.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Records that the rule body finished.
    pub fn complete(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    /// True once a parent has been removed.
    #[must_use]
    pub fn should_free(&self) -> bool {
        self.should_free.load(Ordering::SeqCst)
    }

    /// Sets `should_free`. Returns false if it was already set.
    pub fn mark_should_free(&self) -> bool {
        !self.should_free.swap(true, Ordering::SeqCst)
    }

    /// The worker running the body, if one has claimed it.
    #[must_use]
    pub fn worker(&self) -> Option<usize> {
        match self.worker.load(Ordering::SeqCst) {
            NO_WORKER => None,
            w => Some(w),
        }
    }

    /// Records which worker is running the body.
    pub fn set_worker(&self, worker: Option<usize>) {
        self.worker
            .store(worker.unwrap_or(NO_WORKER), Ordering::SeqCst);
    }

    /// The token the running body polls for cancellation.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Locks the list of statements this match produced.
    pub fn children(&self) -> MutexGuard<'_, EdgeList<StatementRef>> {
        self.children.lock()
    }
}

impl Entity for Match {
    type Ref = MatchRef;

    fn is_sustained(&self) -> bool {
        !self.should_free()
    }

    fn exhausted(limit: usize) -> Capacity {
        Capacity::MatchPool { limit }
    }
}

impl fmt::Debug for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("parents", &self.parents)
            .field("completed", &self.is_completed())
            .field("should_free", &self.should_free())
            .field("worker", &self.worker())
            .finish_non_exhaustive()
    }
}
