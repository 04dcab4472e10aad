//! # Runtime
//!
//! Watch-loop plumbing around the reconciler.

pub mod error_policy;

pub use error_policy::{handle_reconciliation_error, retain_backoff_states};
