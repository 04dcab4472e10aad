//! # Controller
//!
//! Reconciliation machinery: the reconciler itself and the retry backoff
//! calculator consumed by the error policy.

pub mod backoff;
pub mod reconciler;

pub use reconciler::{reconcile, Reconciler, ReconcilerError};
