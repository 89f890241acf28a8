//! Terms: the atomic text values that make up clauses.
//!
//! A term of the form `/name/` is a variable, `/...name/` is a rest variable
//! that captures every remaining term of the opposite clause, and the names
//! listed in [`NON_CAPTURING_NAMES`] match anything without binding.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Variable names that match any term but never produce a binding.
pub const NON_CAPTURING_NAMES: [&str; 5] = ["someone", "something", "anyone", "anything", "any"];

/// Prefix that marks a variable name as a rest variable.
pub const REST_PREFIX: &str = "...";

/// An immutable text term.
///
/// Cloning a term is cheap: the text is reference counted and shared
/// between every clause that mentions it. Two terms are equal iff their
/// bytes are identical.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Term(Arc<str>);

/// How a term participates in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind<'a> {
    /// A plain value that only matches a byte-identical term.
    Literal,
    /// `/name/`: matches one term and binds it to `name`.
    Variable(&'a str),
    /// `/someone/` and friends: matches one term, binds nothing.
    NonCapturing,
    /// `/...name/`: matches every remaining term and binds them as a list.
    Rest(&'a str),
}

impl Term {
    /// Creates a term from any string-like value.
    #[must_use]
    pub fn new(text: impl AsRef<str>) -> Self {
        Self(Arc::from(text.as_ref()))
    }

    /// Returns the term text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the length of the term in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the term is the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the variable name if this term is `/name/`.
    ///
    /// The name excludes the slashes and keeps any `...` rest prefix.
    /// `//` and terms containing an inner slash are literals.
    #[must_use]
    pub fn variable_name(&self) -> Option<&str> {
        let inner = self.0.strip_prefix('/')?.strip_suffix('/')?;
        if inner.is_empty() || inner.contains('/') {
            return None;
        }
        Some(inner)
    }

    /// Classifies the term for matching.
    #[must_use]
    pub fn kind(&self) -> TermKind<'_> {
        match self.variable_name() {
            None => TermKind::Literal,
            Some(name) => {
                if let Some(rest) = name.strip_prefix(REST_PREFIX) {
                    TermKind::Rest(rest)
                } else if NON_CAPTURING_NAMES.contains(&name) {
                    TermKind::NonCapturing
                } else {
                    TermKind::Variable(name)
                }
            }
        }
    }

    /// Returns true for any variable form, capturing or not.
    #[must_use]
    pub fn is_variable(&self) -> bool {
        self.variable_name().is_some()
    }

    /// Returns true if this is a `/...name/` rest variable.
    #[must_use]
    pub fn is_rest(&self) -> bool {
        matches!(self.kind(), TermKind::Rest(_))
    }

    /// Builds the `/name/` variable term for `name`.
    #[must_use]
    pub fn variable(name: &str) -> Self {
        Self::new(format!("/{name}/"))
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for Term {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Term {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Term {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for Term {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&String> for Term {
    fn from(s: &String) -> Self {
        Self::new(s)
    }
}

impl PartialEq<str> for Term {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Term {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}
