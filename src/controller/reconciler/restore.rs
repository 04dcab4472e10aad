//! # Restore Workflow
//!
//! First-pass workflow: clone the repository, look for an existing dump
//! artifact, and restore it into the database if one is found.
//!
//! The working copy is an ephemeral clone scoped to this invocation and is
//! always removed on exit, success or failure.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::DUMP_FILE_NAME;
use crate::crd::PostgresSync;
use crate::observability::metrics;

use super::types::WorkflowDeps;

/// Outcome of one restore pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// An existing dump was found and applied to the database
    Restored,
    /// The repository held no dump artifact; nothing was applied
    NoDump,
}

/// Run the restore workflow for one resource.
///
/// Database credentials are only resolved once a dump artifact has actually
/// been located; a repository without a dump succeeds without touching the
/// database secret.
pub async fn run_restore(deps: WorkflowDeps<'_>, sync: &PostgresSync) -> Result<RestoreOutcome> {
    let namespace = sync.metadata.namespace.as_deref().unwrap_or("default");

    let git_auth = deps
        .credentials
        .git_credentials(namespace, &sync.spec.git_credentials.secret_name)
        .await?;

    let workdir = tempfile::Builder::new()
        .prefix("postgres-sync-")
        .tempdir()
        .context("failed to create working copy directory")?;

    deps.repository
        .clone_into(&sync.spec.repository_url, &git_auth, workdir.path())
        .await?;

    let result = restore_from_working_copy(deps, sync, namespace, workdir.path()).await;

    // Cleanup failure must not mask the workflow result
    if let Err(e) = workdir.close() {
        warn!("failed to remove working copy: {e}");
    }

    result
}

async fn restore_from_working_copy(
    deps: WorkflowDeps<'_>,
    sync: &PostgresSync,
    namespace: &str,
    workdir: &Path,
) -> Result<RestoreOutcome> {
    let Some(dump_file) = locate_dump(workdir, sync.dump_dir()).await? else {
        info!("no existing {DUMP_FILE_NAME} found in repository");
        return Ok(RestoreOutcome::NoDump);
    };

    let endpoint = deps
        .credentials
        .database_endpoint(
            namespace,
            &sync.spec.database_credentials.secret_name,
            &sync.spec.database_service,
        )
        .await?;

    deps.executor
        .restore(&endpoint, &dump_file)
        .await
        .context("failed to restore database")?;

    metrics::increment_restores();
    info!(host = %endpoint.host, "database restore completed");
    Ok(RestoreOutcome::Restored)
}

/// Locate the dump artifact inside the working copy.
///
/// A missing dump directory is created so later dump workflows have a
/// target, and reported as "no dump" rather than an error.
pub async fn locate_dump(workdir: &Path, dump_dir: &str) -> Result<Option<PathBuf>> {
    let dumps_dir = workdir.join(dump_dir);
    if !dumps_dir.exists() {
        info!(path = %dumps_dir.display(), "no dump directory found, creating it");
        tokio::fs::create_dir_all(&dumps_dir)
            .await
            .with_context(|| format!("failed to create dump directory {}", dumps_dir.display()))?;
        return Ok(None);
    }

    let dump_file = dumps_dir.join(DUMP_FILE_NAME);
    if dump_file.exists() {
        Ok(Some(dump_file))
    } else {
        Ok(None)
    }
}
