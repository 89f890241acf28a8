//! The boundary between the runtime and whatever evaluates rule bodies.
//!
//! The runtime hands each firing to an [`Evaluator`] together with a
//! [`Handle`] the body can use to assert, query, hold, and so on. Bodies
//! run on worker threads with no database lock held.

use std::fmt;

use tessera_engine::RuleKind;
use tessera_foundation::{CancelToken, Clause, ErrorKind, MatchRef, Result, StatementRef, Term};
use tessera_storage::Environment;

use crate::runtime::Handle;

/// Everything a rule body needs to run.
pub struct Firing<'a> {
    /// `when` or `subscribe`.
    pub kind: RuleKind,
    /// The rule statement.
    pub rule: StatementRef,
    /// The body term.
    pub body: &'a Term,
    /// The captured environment term.
    pub environment: &'a Term,
    /// Pattern bindings.
    pub bindings: &'a Environment,
    /// The matched data clause, or the notified event.
    pub clause: Option<&'a Clause>,
    /// The match sustaining anything the body says; `None` for subscribe.
    pub match_ref: Option<MatchRef>,
    /// Cancelled when a parent of the match goes away.
    pub cancel: &'a CancelToken,
}

impl Firing<'_> {
    /// True once the body should stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `Err(Cancelled)` once the body should stop.
    pub fn check_cancelled(&self) -> Result<()> {
        self.cancel.check()
    }
}

impl fmt::Debug for Firing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Firing")
            .field("kind", &self.kind)
            .field("rule", &self.rule)
            .field("body", &self.body)
            .field("bindings", &self.bindings)
            .field("match_ref", &self.match_ref)
            .finish_non_exhaustive()
    }
}

/// How a rule body finished.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvalOutcome {
    /// The body ran to completion.
    Completed,
    /// The body failed. Logged; never fatal.
    Failed(String),
    /// The body stopped because it was cancelled.
    Cancelled,
}

impl From<Result<()>> for EvalOutcome {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Completed,
            Err(err) if matches!(err.kind, ErrorKind::Cancelled) => Self::Cancelled,
            Err(err) => Self::Failed(err.to_string()),
        }
    }
}

/// Runs rule bodies.
pub trait Evaluator: Send + Sync + 'static {
    /// Evaluates one firing.
    fn evaluate(&self, firing: &Firing<'_>, handle: &Handle) -> EvalOutcome;
}

impl<F> Evaluator for F
where
    F: Fn(&Firing<'_>, &Handle) -> EvalOutcome + Send + Sync + 'static,
{
    fn evaluate(&self, firing: &Firing<'_>, handle: &Handle) -> EvalOutcome {
        self(firing, handle)
    }
}

/// An evaluator that completes every body without doing anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEvaluator;

impl Evaluator for NoopEvaluator {
    fn evaluate(&self, _firing: &Firing<'_>, _handle: &Handle) -> EvalOutcome {
        EvalOutcome::Completed
    }
}
