//! Core value types for Tessera.
//!
//! This crate provides:
//! - [`Term`] and [`Clause`] - The immutable tuples stored in the database
//! - [`StatementRef`] and [`MatchRef`] - Generational weak references
//! - [`Error`] - Rich error types with context
//! - [`DbConfig`] and [`SchedulerConfig`] - Tuning parameters
//! - [`CancelToken`] - Cooperative cancellation for rule bodies

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cancel;
pub mod clause;
pub mod config;
pub mod error;
pub mod refs;
pub mod term;

pub use cancel::CancelToken;
pub use clause::Clause;
pub use config::{DbConfig, SchedulerConfig};
pub use error::{Capacity, Error, ErrorContext, ErrorKind, Result};
pub use refs::{AnyRef, MatchRef, StatementRef};
pub use term::{NON_CAPTURING_NAMES, Term, TermKind};
