//! # Custom Resource Definitions
//!
//! CRD types for the PostgresSync controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - Main CRD specification and spec-level references
//! - `status.rs` - Status types for tracking reconciliation state

mod spec;
mod status;

// Re-export all public types
pub use spec::{CredentialRef, DatabaseServiceRef, PostgresSync, PostgresSyncSpec, StatefulSetRef};
pub use status::{PostgresSyncPhase, PostgresSyncStatus};
