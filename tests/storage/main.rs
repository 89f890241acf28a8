//! Integration tests for Layer 1: Storage
//!
//! Tests for the trie index, unification, the entity arena, and hold registers.

mod arena;
mod holds;
mod index;
mod unification;
