//! Tessera - Reactive fact store
//!
//! This crate re-exports all layers of the Tessera system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: tessera_runtime     — Scheduler, monitor, evaluator boundary, Runtime
//! Layer 2: tessera_engine      — Clause rewrites, work items, reactive Db
//! Layer 1: tessera_storage     — Trie index, unification, entity arena, holds
//! Layer 0: tessera_foundation  — Core types (Term, Clause, refs, Error, config)
//! ```

pub use tessera_engine as engine;
pub use tessera_foundation as foundation;
pub use tessera_runtime as runtime;
pub use tessera_storage as storage;
