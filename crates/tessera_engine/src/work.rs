//! Work items: the units of reactive work handed to the scheduler.

use std::fmt;

use tessera_foundation::{Clause, MatchRef, StatementRef};
use tessera_storage::Destructor;

/// A scheduled run of a `when` rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WhenFiring {
    /// The rule statement.
    pub rule: StatementRef,
    /// Pattern to unify against the data statement's clause.
    pub pattern: Clause,
    /// The matched data statement; `None` for empty-pattern rules.
    pub data: Option<StatementRef>,
}

/// A scheduled run of a `subscribe` rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeFiring {
    /// The rule statement.
    pub rule: StatementRef,
    /// The rule's pattern.
    pub pattern: Clause,
    /// The notified clause.
    pub event: Clause,
}

/// Pending work.
pub enum WorkItem {
    /// Assert a clause as a premise.
    Assert(Clause),
    /// Withdraw the assertions behind every statement matching a pattern.
    Retract(Clause),
    /// Install a clause in a hold register.
    Hold {
        /// Register key.
        key: String,
        /// Version; negative means next.
        version: i64,
        /// The clause to hold.
        clause: Clause,
        /// Run when the held statement is removed.
        destructor: Option<Destructor>,
    },
    /// Assert a clause sustained by a running match.
    Say {
        /// The sustaining match.
        parent: MatchRef,
        /// The clause to assert.
        clause: Clause,
    },
    /// Run a `when` rule body.
    RunWhen(WhenFiring),
    /// Run a `subscribe` rule body.
    RunSubscribe(SubscribeFiring),
    /// Drop one sustain from a statement.
    RemoveParent(StatementRef),
    /// Run an arbitrary callback.
    Callback(Destructor),
}

impl WorkItem {
    /// Short name of the operation, for logs.
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::Assert(_) => "assert",
            Self::Retract(_) => "retract",
            Self::Hold { .. } => "hold",
            Self::Say { .. } => "say",
            Self::RunWhen(_) => "run-when",
            Self::RunSubscribe(_) => "run-subscribe",
            Self::RemoveParent(_) => "remove-parent",
            Self::Callback(_) => "callback",
        }
    }

    /// Wraps a closure as a callback item.
    #[must_use]
    pub fn callback(f: impl FnOnce() + Send + 'static) -> Self {
        Self::Callback(Box::new(f))
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assert(clause) => write!(f, "Assert({clause})"),
            Self::Retract(pattern) => write!(f, "Retract({pattern})"),
            Self::Hold {
                key,
                version,
                clause,
                destructor,
            } => f
                .debug_struct("Hold")
                .field("key", key)
                .field("version", version)
                .field("clause", clause)
                .field("destructor", &destructor.is_some())
                .finish(),
            Self::Say { parent, clause } => write!(f, "Say({parent}, {clause})"),
            Self::RunWhen(firing) => write!(f, "{firing:?}"),
            Self::RunSubscribe(firing) => write!(f, "{firing:?}"),
            Self::RemoveParent(r) => write!(f, "RemoveParent({r})"),
            Self::Callback(_) => write!(f, "Callback"),
        }
    }
}
