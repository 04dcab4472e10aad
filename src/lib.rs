//! PostgresSync Controller Library
//!
//! Core functionality for the PostgresSync controller: the CRD types, the
//! reconciler with its restore and dump workflows, the git and PostgreSQL
//! tool wrappers, and the HTTP surface (webhook, metrics, probes).
//! Tests are included in the module files.

pub mod constants;
pub mod controller;
pub mod crd;
pub mod executor;
pub mod git;
pub mod observability;
pub mod runtime;
pub mod server;

pub use controller::{reconcile, Reconciler, ReconcilerError};
pub use crd::{PostgresSync, PostgresSyncPhase, PostgresSyncSpec, PostgresSyncStatus};
