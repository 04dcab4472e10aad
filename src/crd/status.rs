//! # Status Types
//!
//! Observed state of a PostgresSync resource. The status subresource is
//! owned and mutated only by the controller.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Coarse-grained reconciliation outcome for a PostgresSync resource.
///
/// Pending until the referenced StatefulSet is observed ready; Succeeded once
/// an initial restore-or-no-op pass completes; Failed on any workflow error.
/// Failed is not terminal - the resource stays eligible for further passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum PostgresSyncPhase {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

impl std::fmt::Display for PostgresSyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PostgresSyncPhase::Pending => "Pending",
            PostgresSyncPhase::InProgress => "InProgress",
            PostgresSyncPhase::Succeeded => "Succeeded",
            PostgresSyncPhase::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Status of the PostgresSync resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostgresSyncStatus {
    /// Current phase of the sync operation
    #[serde(default)]
    pub phase: Option<PostgresSyncPhase>,
    /// Human-readable message explaining the current status
    #[serde(default)]
    pub message: Option<String>,
    /// Timestamp of the last successful dump (RFC 3339); absent until the
    /// first dump has been committed and pushed
    #[serde(default)]
    pub last_sync_time: Option<String>,
}
