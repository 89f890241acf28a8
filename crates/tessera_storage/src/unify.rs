//! Positional unification of two clauses.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use tessera_foundation::{Clause, Error, Result, Term, TermKind};

/// The value bound to a variable.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Binding {
    /// A single term, from a `/name/` variable.
    Term(Term),
    /// The trailing terms captured by a `/...name/` variable.
    Rest(Vec<Term>),
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Term(t) => write!(f, "{t}"),
            Self::Rest(terms) => {
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{t}")?;
                }
                Ok(())
            }
        }
    }
}

/// Ordered name to value bindings produced by [`unify`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Environment {
    bindings: Vec<(String, Binding)>,
}

impl Environment {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Looks up a binding by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b)
    }

    /// Looks up a single-term binding by name.
    #[must_use]
    pub fn term(&self, name: &str) -> Option<&Term> {
        match self.get(name)? {
            Binding::Term(t) => Some(t),
            Binding::Rest(_) => None,
        }
    }

    /// Iterates over bindings in the order they were made.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.bindings.iter().map(|(n, b)| (n.as_str(), b))
    }

    /// Adds a binding, keeping at most `limit` bindings.
    ///
    /// Binding a name twice succeeds only if the value is the same; the
    /// return value is false on conflict.
    pub fn bind(&mut self, name: &str, value: Binding, limit: usize) -> Result<bool> {
        if let Some(existing) = self.get(name) {
            return Ok(*existing == value);
        }
        if self.bindings.len() >= limit {
            return Err(Error::too_many_bindings(limit));
        }
        self.bindings.push((name.to_string(), value));
        Ok(true)
    }

    /// Replaces bound variables in `clause` with their values.
    ///
    /// Rest bindings splice their terms in place. Unbound and
    /// non-capturing variables are left as they are.
    #[must_use]
    pub fn substitute(&self, clause: &Clause) -> Clause {
        let mut out = Vec::with_capacity(clause.len());
        for term in clause {
            let name = match term.kind() {
                TermKind::Variable(name) | TermKind::Rest(name) => name,
                TermKind::Literal | TermKind::NonCapturing => {
                    out.push(term.clone());
                    continue;
                }
            };
            match self.get(name) {
                Some(Binding::Term(t)) => out.push(t.clone()),
                Some(Binding::Rest(terms)) => out.extend(terms.iter().cloned()),
                None => out.push(term.clone()),
            }
        }
        Clause::new(out)
    }
}

/// Unifies `a` against `b` position by position.
///
/// A variable on either side binds the other side's term; a rest variable
/// binds every remaining term of the other side and ends the walk. Literal
/// terms must be byte-equal, and the clauses must have the same length
/// unless a rest variable absorbs the difference.
///
/// Returns `Ok(None)` when the clauses do not unify and
/// `Err(TooManyBindings)` when more than `max_bindings` names are bound.
pub fn unify(a: &Clause, b: &Clause, max_bindings: usize) -> Result<Option<Environment>> {
    let mut env = Environment::new();
    let len = a.len().max(b.len());

    for i in 0..len {
        let (x, y) = (a.get(i), b.get(i));

        if let Some(TermKind::Rest(name)) = x.map(Term::kind) {
            let tail = b.terms().get(i..).unwrap_or_default().to_vec();
            return finish(env.bind(name, Binding::Rest(tail), max_bindings)?, env);
        }
        if let Some(TermKind::Rest(name)) = y.map(Term::kind) {
            let tail = a.terms().get(i..).unwrap_or_default().to_vec();
            return finish(env.bind(name, Binding::Rest(tail), max_bindings)?, env);
        }

        let (Some(x), Some(y)) = (x, y) else {
            return Ok(None);
        };

        let ok = match (x.kind(), y.kind()) {
            (TermKind::Variable(name), _) => {
                env.bind(name, Binding::Term(y.clone()), max_bindings)?
            }
            (TermKind::NonCapturing, _) | (_, TermKind::NonCapturing) => true,
            (_, TermKind::Variable(name)) => {
                env.bind(name, Binding::Term(x.clone()), max_bindings)?
            }
            _ => x == y,
        };
        if !ok {
            return Ok(None);
        }
    }

    Ok(Some(env))
}

fn finish(ok: bool, env: Environment) -> Result<Option<Environment>> {
    Ok(ok.then_some(env))
}
