//! Persistent trie keyed by clause terms.
//!
//! Every mutation returns a new [`Trie`] that shares all untouched nodes with
//! the old one. Readers holding an older root keep seeing a consistent
//! index no matter what writers do afterwards.
//!
//! Each node keeps literal keys and variable keys in separate branch maps,
//! so a literal pattern term visits its exact branch plus only the
//! variable branches instead of scanning every child.

use std::fmt;
use std::sync::Arc;

use im::OrdMap;
use tessera_foundation::{Clause, Term, TermKind};

struct Node<V> {
    value: Option<V>,
    literals: OrdMap<Term, Arc<Node<V>>>,
    variables: OrdMap<Term, Arc<Node<V>>>,
}

impl<V: Clone> Clone for Node<V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            literals: self.literals.clone(),
            variables: self.variables.clone(),
        }
    }
}

impl<V> Node<V> {
    fn empty() -> Self {
        Self {
            value: None,
            literals: OrdMap::new(),
            variables: OrdMap::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.value.is_none() && self.literals.is_empty() && self.variables.is_empty()
    }

    fn branch(&self, key: &Term) -> Option<&Arc<Node<V>>> {
        if key.is_variable() {
            self.variables.get(key)
        } else {
            self.literals.get(key)
        }
    }

    fn children(&self) -> impl Iterator<Item = (&Term, &Arc<Node<V>>)> {
        self.literals.iter().chain(self.variables.iter())
    }
}

/// A persistent map from clauses to values with pattern lookup.
pub struct Trie<V> {
    root: Arc<Node<V>>,
    len: usize,
}

impl<V> Clone for Trie<V> {
    fn clone(&self) -> Self {
        Self {
            root: Arc::clone(&self.root),
            len: self.len,
        }
    }
}

impl<V: Clone> Default for Trie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> Trie<V> {
    /// Creates an empty trie.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Arc::new(Node::empty()),
            len: 0,
        }
    }

    /// Returns the number of stored clauses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns a new trie with `clause` mapped to `value`.
    ///
    /// An existing value for the same clause is replaced.
    #[must_use]
    pub fn add(&self, clause: &Clause, value: V) -> Self {
        let (root, fresh) = add_at(&self.root, clause.terms(), value);
        Self {
            root: Arc::new(root),
            len: self.len + usize::from(fresh),
        }
    }

    /// Returns a new trie without `clause`, and the value it held.
    ///
    /// Terms are compared literally; variables in `clause` only match the
    /// identical variable term.
    #[must_use]
    pub fn remove(&self, clause: &Clause) -> (Self, Option<V>) {
        self.remove_if(clause, |_| true)
    }

    /// Removes `clause` only if `keep_going` approves its current value.
    ///
    /// Returns the unchanged trie and `None` if the clause is absent or the
    /// predicate declined.
    #[must_use]
    pub fn remove_if<F>(&self, clause: &Clause, keep_going: F) -> (Self, Option<V>)
    where
        F: FnOnce(&V) -> bool,
    {
        match remove_at(&self.root, clause.terms(), keep_going) {
            Some((node, value)) => (
                Self {
                    root: Arc::new(node.unwrap_or_else(Node::empty)),
                    len: self.len - 1,
                },
                Some(value),
            ),
            None => (self.clone(), None),
        }
    }

    /// Exact-term lookup with no variable semantics.
    #[must_use]
    pub fn lookup_literal(&self, clause: &Clause) -> Option<V> {
        let mut node = &self.root;
        for term in clause {
            node = node.branch(term)?;
        }
        node.value.clone()
    }

    /// Returns the values of every stored clause that `pattern` can match.
    ///
    /// Pattern variables match any single term and pattern rest variables
    /// match one or more trailing terms. Variables stored in the trie are
    /// honoured the same way from the other side.
    #[must_use]
    pub fn lookup(&self, pattern: &Clause) -> Vec<V> {
        let mut out = Vec::new();
        lookup_at(&self.root, pattern.terms(), &mut out);
        out
    }

    /// Returns every stored value.
    #[must_use]
    pub fn values(&self) -> Vec<V> {
        let mut out = Vec::with_capacity(self.len);
        collect_all(&self.root, &mut out);
        out
    }
}

fn add_at<V: Clone>(node: &Node<V>, terms: &[Term], value: V) -> (Node<V>, bool) {
    let mut next = node.clone();
    let Some((key, rest)) = terms.split_first() else {
        let fresh = next.value.is_none();
        next.value = Some(value);
        return (next, fresh);
    };

    let empty = Node::empty();
    let child = node.branch(key).map_or(&empty, |c| &**c);
    let (child, fresh) = add_at(child, rest, value);
    let map = if key.is_variable() {
        &mut next.variables
    } else {
        &mut next.literals
    };
    map.insert(key.clone(), Arc::new(child));
    (next, fresh)
}

/// Returns `None` if nothing was removed. Otherwise the replacement node
/// (`None` when it became empty and should be pruned) and the old value.
#[allow(clippy::type_complexity)]
fn remove_at<V: Clone, F>(node: &Node<V>, terms: &[Term], keep_going: F) -> Option<(Option<Node<V>>, V)>
where
    F: FnOnce(&V) -> bool,
{
    let mut next = node.clone();
    let Some((key, rest)) = terms.split_first() else {
        let value = next.value.take()?;
        if !keep_going(&value) {
            return None;
        }
        return Some(((!next.is_empty()).then_some(next), value));
    };

    let child = node.branch(key)?;
    let (child, value) = remove_at(child, rest, keep_going)?;
    let map = if key.is_variable() {
        &mut next.variables
    } else {
        &mut next.literals
    };
    match child {
        Some(child) => {
            map.insert(key.clone(), Arc::new(child));
        }
        None => {
            map.remove(key);
        }
    }
    Some(((!next.is_empty()).then_some(next), value))
}

fn collect_all<V: Clone>(node: &Node<V>, out: &mut Vec<V>) {
    if let Some(value) = &node.value {
        out.push(value.clone());
    }
    for (_, child) in node.children() {
        collect_all(child, out);
    }
}

fn lookup_at<V: Clone>(node: &Node<V>, pattern: &[Term], out: &mut Vec<V>) {
    let Some((term, rest)) = pattern.split_first() else {
        if let Some(value) = &node.value {
            out.push(value.clone());
        }
        return;
    };

    match term.kind() {
        TermKind::Variable(_) | TermKind::NonCapturing => {
            for (_, child) in node.children() {
                lookup_at(child, rest, out);
            }
        }
        TermKind::Rest(_) => {
            for (_, child) in node.children() {
                collect_all(child, out);
            }
        }
        TermKind::Literal => {
            if let Some(child) = node.literals.get(term) {
                lookup_at(child, rest, out);
            }
            for (key, child) in &node.variables {
                if key.is_rest() {
                    collect_all(child, out);
                } else {
                    lookup_at(child, rest, out);
                }
            }
        }
    }
}

impl<V: Clone + fmt::Debug> fmt::Debug for Trie<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trie")
            .field("len", &self.len)
            .field("values", &self.values())
            .finish()
    }
}
