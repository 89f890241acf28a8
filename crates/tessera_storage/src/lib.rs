//! Storage layer for Tessera.
//!
//! This crate provides:
//! - [`Trie`] - Persistent copy-on-write pattern index
//! - [`unify`] and [`Environment`] - Positional clause unification
//! - [`Pool`] and [`Acquired`] - Generation-checked entity pools
//! - [`Statement`] and [`Match`] - The pooled entities and their edges
//! - [`HoldTable`] - Versioned hold registers

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod arena;
pub mod edges;
pub mod entity;
pub mod hold;
pub mod trie;
pub mod unify;

pub use arena::{Acquired, Entity, Pool, SlotRef};
pub use edges::EdgeList;
pub use entity::{Destructor, Match, Statement, StatementEdge, StatementLinks};
pub use hold::{HoldOutcome, HoldTable};
pub use trie::Trie;
pub use unify::{Binding, Environment, unify};
