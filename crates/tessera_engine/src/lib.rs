//! Reactive engine for Tessera.
//!
//! This crate provides:
//! - [`Db`] - The fact database with reference-counted sustains
//! - [`WorkItem`] - Units of work produced by every mutation
//! - [`Activation`] - A rule firing ready for its body to run
//! - [`transforms`] - Clause rewrites for `when`, `subscribe`, and claims

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod db;
mod propagate;
pub mod transforms;
pub mod work;

pub use db::{Activation, Db, HoldReceipt, QueryResult};
pub use transforms::{
    RuleKind, RuleView, claimize, is_claim, rule, subscriptionize, unclaimize, unsubscriptionize,
    unwhenize, whenize,
};
pub use work::{SubscribeFiring, WhenFiring, WorkItem};
