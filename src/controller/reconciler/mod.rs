//! # Reconciler
//!
//! Core reconciliation logic for PostgresSync resources.
//!
//! The reconciler:
//! - Watches PostgresSync resources across all namespaces
//! - Gates each pass on the readiness of the referenced StatefulSet
//! - Restores the stored dump into a freshly-ready database (first pass)
//! - Dumps the database and pushes it to the git repository when the
//!   webhook trigger flag is set
//! - Updates resource status with reconciliation results
//!
//! ## Reconciliation Flow
//!
//! 1. Get the referenced StatefulSet; requeue while it is absent or not ready
//! 2. First ready pass: clone the repository and restore `dump.sql` if present
//! 3. Trigger pass: `pg_dump` into a fresh clone, commit and push, then
//!    clear the trigger flag
//! 4. Update status and wait for the next change

pub mod credentials;
pub mod dump;
pub mod mapper;
pub mod reconcile;
pub mod restore;
pub mod status;
pub mod types;

#[cfg(test)]
pub mod testing;

// Re-export public API
pub use credentials::{CredentialResolver, SecretCredentialResolver};
pub use dump::run_dump;
pub use mapper::syncs_for_stateful_set;
pub use reconcile::reconcile;
pub use restore::{run_restore, RestoreOutcome};
pub use status::{update_status, KubeSyncPatcher, SyncPatcher};
pub use types::{BackoffState, Reconciler, ReconcilerError, WorkflowDeps};
