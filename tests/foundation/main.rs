//! Integration tests for Layer 0: Foundation
//!
//! Tests for core types: Term, Clause, references, errors, and configuration.

mod clauses;
mod errors;
mod refs;
