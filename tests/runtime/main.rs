//! Integration tests for Layer 3: Runtime
//!
//! Tests for the scheduler, end-to-end rule evaluation, cancellation, and
//! the evaluator-facing API.

mod api;
mod cancellation;
mod reactive;
mod scheduling;

use std::time::Duration;

use tessera_foundation::Clause;

pub const IDLE: Duration = Duration::from_secs(20);

pub fn c(text: &str) -> Clause {
    Clause::parse(text)
}
