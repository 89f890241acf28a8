//! Clauses: ordered, immutable tuples of terms.

use std::fmt;
use std::ops::Index;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::term::Term;

/// An ordered, fixed-length sequence of terms.
///
/// Clauses never change after construction. Cloning shares the term
/// storage, so a clause can be handed to the index, a statement, and a
/// work item without copying.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Clause(Arc<[Term]>);

impl Clause {
    /// Creates a clause from a list of terms.
    #[must_use]
    pub fn new(terms: Vec<Term>) -> Self {
        Self(Arc::from(terms))
    }

    /// Returns the empty clause.
    #[must_use]
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    /// Splits `text` on ASCII whitespace into a clause.
    ///
    /// Convenient for tests and boot scripts; terms containing spaces must be
    /// built with [`Clause::new`].
    #[must_use]
    pub fn parse(text: &str) -> Self {
        text.split_ascii_whitespace().map(Term::from).collect()
    }

    /// Returns the terms of this clause.
    #[must_use]
    pub fn terms(&self) -> &[Term] {
        &self.0
    }

    /// Returns the number of terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the clause has no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the term at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Term> {
        self.0.get(index)
    }

    /// Returns the first term, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Term> {
        self.0.first()
    }

    /// Returns true if the term at `index` equals `text`.
    #[must_use]
    pub fn term_is(&self, index: usize, text: &str) -> bool {
        self.get(index).is_some_and(|t| t.as_str() == text)
    }

    /// Iterates over the terms.
    pub fn iter(&self) -> std::slice::Iter<'_, Term> {
        self.0.iter()
    }

    /// Returns a new clause containing `range` of this one.
    #[must_use]
    pub fn slice(&self, range: std::ops::Range<usize>) -> Self {
        Self::new(self.0[range].to_vec())
    }

    /// Returns true if any term is a variable.
    #[must_use]
    pub fn has_variables(&self) -> bool {
        self.0.iter().any(Term::is_variable)
    }
}

impl Default for Clause {
    fn default() -> Self {
        Self::empty()
    }
}

impl Index<usize> for Clause {
    type Output = Term;

    fn index(&self, index: usize) -> &Term {
        &self.0[index]
    }
}

impl FromIterator<Term> for Clause {
    fn from_iter<I: IntoIterator<Item = Term>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Clause {
    type Item = &'a Term;
    type IntoIter = std::slice::Iter<'a, Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<Term>> for Clause {
    fn from(terms: Vec<Term>) -> Self {
        Self::new(terms)
    }
}

impl From<&[&str]> for Clause {
    fn from(terms: &[&str]) -> Self {
        terms.iter().map(|t| Term::from(*t)).collect()
    }
}

impl<const N: usize> From<[&str; N]> for Clause {
    fn from(terms: [&str; N]) -> Self {
        terms.iter().map(|t| Term::from(*t)).collect()
    }
}

impl fmt::Debug for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Clause(")?;
        for (i, term) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{term:?}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(term.as_str())?;
        }
        Ok(())
    }
}

/// Builds a [`Clause`] from string-like terms.
///
/// ```
/// use tessera_foundation::clause;
///
/// let c = clause!["the", "time", "is", "3"];
/// assert_eq!(c.len(), 4);
/// ```
#[macro_export]
macro_rules! clause {
    () => {
        $crate::Clause::empty()
    };
    ($($term:expr),+ $(,)?) => {
        $crate::Clause::new(vec![$($crate::Term::from($term)),+])
    };
}
