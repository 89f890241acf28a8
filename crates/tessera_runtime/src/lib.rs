//! Runtime for Tessera.
//!
//! This crate provides:
//! - [`Runtime`] - A database with workers executing its work items
//! - [`Handle`] - The API exposed to rule bodies and host code
//! - [`Evaluator`] - The seam where rule bodies are run
//! - [`Scheduler`] - The work-stealing worker pool
//! - [`Monitor`] - Periodic rebalancing, timed removals, and the clock hold
//! - [`logging`] - Subscriber setup for `tracing` output

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod evaluator;
pub mod logging;
pub mod monitor;
pub mod runtime;
pub mod scheduler;
pub mod semaphore;
pub mod sustain;

pub use config::RuntimeConfig;
pub use evaluator::{EvalOutcome, Evaluator, Firing, NoopEvaluator};
pub use monitor::{Monitor, TickHook};
pub use runtime::{CLOCK_KEY, Handle, Runtime, current_match_ref};
pub use scheduler::{Scheduler, Spawner};
pub use semaphore::Semaphore;
pub use sustain::RemoveLater;
