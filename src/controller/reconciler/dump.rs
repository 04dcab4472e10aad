//! # Dump Workflow
//!
//! Trigger-driven workflow: clone the repository, produce a fresh dump of
//! the database into the working copy, and commit and push it.
//!
//! A dump that is byte-identical to the stored artifact is a success with
//! nothing to push; the repository already holds the desired state.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::constants::{DUMP_COMMIT_MESSAGE, DUMP_FILE_NAME};
use crate::crd::PostgresSync;
use crate::git::PushOutcome;
use crate::observability::metrics;

use super::types::WorkflowDeps;

/// Run the dump workflow for one resource.
///
/// Both credential bundles are resolved up front so a configuration error
/// fails the pass before any external side effect.
pub async fn run_dump(deps: WorkflowDeps<'_>, sync: &PostgresSync) -> Result<()> {
    let namespace = sync.metadata.namespace.as_deref().unwrap_or("default");

    let endpoint = deps
        .credentials
        .database_endpoint(
            namespace,
            &sync.spec.database_credentials.secret_name,
            &sync.spec.database_service,
        )
        .await?;
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

    let result = dump_into_working_copy(deps, sync, &endpoint, workdir.path()).await;

    // Cleanup failure must not mask the workflow result
    if let Err(e) = workdir.close() {
        warn!("failed to remove working copy: {e}");
    }

    result
}

async fn dump_into_working_copy(
    deps: WorkflowDeps<'_>,
    sync: &PostgresSync,
    endpoint: &crate::executor::DatabaseEndpoint,
    workdir: &Path,
) -> Result<()> {
    let dumps_dir = workdir.join(sync.dump_dir());
    tokio::fs::create_dir_all(&dumps_dir)
        .await
        .with_context(|| format!("failed to create dump directory {}", dumps_dir.display()))?;

    let dump_file = dumps_dir.join(DUMP_FILE_NAME);
    deps.executor
        .dump(endpoint, &dump_file)
        .await
        .context("failed to dump database")?;

    match deps
        .repository
        .commit_and_push(workdir, DUMP_COMMIT_MESSAGE)
        .await?
    {
        PushOutcome::Pushed => {
            metrics::increment_dumps();
            info!(host = %endpoint.host, "database dump committed and pushed");
        }
        PushOutcome::NoChanges => {
            info!("dump identical to stored artifact, nothing to push");
        }
    }

    Ok(())
}
