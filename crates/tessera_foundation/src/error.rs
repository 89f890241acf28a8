//! Error types for the Tessera system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::refs::AnyRef;

/// The main error type for Tessera operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates a stale reference error.
    #[must_use]
    pub fn stale_ref(r: impl Into<AnyRef>) -> Self {
        Self::new(ErrorKind::StaleRef(r.into()))
    }

    /// Creates an error for a reference string that does not parse.
    #[must_use]
    pub fn invalid_ref(text: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRef(text.into()))
    }

    /// Creates a too-many-bindings error.
    #[must_use]
    pub fn too_many_bindings(limit: usize) -> Self {
        Self::new(ErrorKind::TooManyBindings(limit))
    }

    /// Creates a capacity exhaustion error.
    #[must_use]
    pub fn capacity_exhausted(capacity: Capacity) -> Self {
        Self::new(ErrorKind::CapacityExhausted(capacity))
    }

    /// Creates an invariant violation error.
    #[must_use]
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invariant(message.into()))
    }

    /// Creates a rule body failure error.
    #[must_use]
    pub fn rule_body(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RuleBody(message.into()))
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    /// Creates a shutdown error.
    #[must_use]
    pub fn shutdown() -> Self {
        Self::new(ErrorKind::Shutdown)
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Returns true if the process cannot safely continue after this error.
    ///
    /// Pool and hold table exhaustion and index/arena desynchronization
    /// are fatal. Everything else is recovered where it happens.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::CapacityExhausted(_) | ErrorKind::Invariant(_)
        )
    }

    /// Returns true if this error only means the target has already gone away.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self.kind, ErrorKind::StaleRef(_))
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// The referenced slot has been recycled (generation mismatch).
    #[error("stale reference: {0}")]
    StaleRef(AnyRef),

    /// A reference string was not of the form `s<index>:<generation>` or `m<index>:<generation>`.
    #[error("invalid reference: {0:?}")]
    InvalidRef(String),

    /// Unification produced more bindings than allowed.
    #[error("too many bindings (limit {0})")]
    TooManyBindings(usize),

    /// A fixed-capacity table ran out of free slots.
    #[error("capacity exhausted: {0}")]
    CapacityExhausted(Capacity),

    /// Index and arena disagree; the database is no longer trustworthy.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// A rule body failed while running.
    #[error("rule body failed: {0}")]
    RuleBody(String),

    /// A rule body was cancelled because one of its parents was removed.
    #[error("cancelled")]
    Cancelled,

    /// The runtime is shutting down.
    #[error("runtime is shut down")]
    Shutdown,

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// The fixed-capacity tables that can run out of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// The statement pool.
    StatementPool {
        /// The configured capacity.
        limit: usize,
    },
    /// The match pool.
    MatchPool {
        /// The configured capacity.
        limit: usize,
    },
    /// The hold table.
    HoldTable {
        /// The configured capacity.
        limit: usize,
    },
    /// The delayed-removal table.
    RemoveLater {
        /// The configured capacity.
        limit: usize,
    },
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatementPool { limit } => write!(f, "statement pool full ({limit} slots)"),
            Self::MatchPool { limit } => write!(f, "match pool full ({limit} slots)"),
            Self::HoldTable { limit } => write!(f, "hold table full ({limit} slots)"),
            Self::RemoveLater { limit } => {
                write!(f, "remove-later table full ({limit} slots)")
            }
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The clause being processed, if any.
    pub clause: Option<String>,
    /// The worker that hit the error, if any.
    pub worker: Option<usize>,
    /// Chain of operations that led here, innermost last.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the clause being processed.
    #[must_use]
    pub fn with_clause(mut self, clause: impl fmt::Display) -> Self {
        self.clause = Some(clause.to_string());
        self
    }

    /// Sets the worker index.
    #[must_use]
    pub fn with_worker(mut self, worker: usize) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Adds a frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(clause) = &self.clause {
            write!(f, "while processing ({clause})")?;
        }
        if let Some(worker) = self.worker {
            write!(f, " on worker {worker}")?;
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}

/// Result type alias using the Tessera error type.
pub type Result<T> = std::result::Result<T, Error>;
