//! # PostgresSync Specification
//!
//! Main CRD specification and default values.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::status::PostgresSyncStatus;

/// PostgresSync Custom Resource Definition
///
/// Declares one sync relationship between a PostgreSQL StatefulSet and a Git
/// repository used as durable storage for database dumps. On first becoming
/// aware of a ready database the controller restores the latest stored dump
/// if one exists; on a webhook trigger it produces a fresh dump and commits
/// it to the repository.
///
/// # Example
///
/// ```yaml
/// apiVersion: dbsync.io/v1alpha1
/// kind: PostgresSync
/// metadata:
///   name: orders-db
///   namespace: default
/// spec:
///   statefulSetRef:
///     name: postgres
///   databaseService:
///     name: postgres-service
///     namespace: data
///   repositoryURL: https://github.com/example/db-dumps.git
///   databaseDumpPath: dumps/orders
///   gitCredentials:
///     secretName: git-credentials
///   databaseCredentials:
///     secretName: db-credentials
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "dbsync.io",
    version = "v1alpha1",
    kind = "PostgresSync",
    namespaced,
    status = "PostgresSyncStatus",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Message", "type":"string", "jsonPath":".status.message"}"#,
    printcolumn = r#"{"name":"Last Sync", "type":"date", "jsonPath":".status.lastSyncTime"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PostgresSyncSpec {
    /// The StatefulSet hosting the database this sync watches
    pub stateful_set_ref: StatefulSetRef,
    /// Service (and optional namespace) used to reach the database
    pub database_service: DatabaseServiceRef,
    /// Git repository URL where dumps are stored
    #[serde(rename = "repositoryURL")]
    pub repository_url: String,
    /// Path within the repository where dumps are stored (default: "dumps")
    #[serde(default)]
    pub database_dump_path: Option<String>,
    /// Secret holding git username/password
    pub git_credentials: CredentialRef,
    /// Secret holding database connection credentials
    pub database_credentials: CredentialRef,
    /// Set to true (normally via the trigger endpoint) to request an
    /// immediate dump; cleared by the controller after the dump succeeds
    #[serde(default)]
    pub dump_on_webhook: bool,
}

/// Reference to the StatefulSet being watched
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatefulSetRef {
    /// Name of the StatefulSet, in the PostgresSync namespace
    pub name: String,
}

/// Service reference for the database connection
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseServiceRef {
    /// Service name
    pub name: String,
    /// Namespace of the service; when set, the host is resolved to the
    /// cluster-local fully-qualified form `name.namespace.svc.cluster.local`
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Reference to a Secret holding credentials
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRef {
    /// Name of the Secret, in the PostgresSync namespace
    pub secret_name: String,
}

impl PostgresSync {
    /// Dump directory inside the repository, falling back to the default
    /// when the spec does not override it.
    #[must_use]
    pub fn dump_dir(&self) -> &str {
        self.spec
            .database_dump_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(crate::constants::DEFAULT_DUMP_PATH)
    }
}
