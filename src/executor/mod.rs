//! # Dump Executor
//!
//! Invokes the database engine's dump and restore operations against a
//! resolved connection target.
//!
//! The [`DumpExecutor`] trait is the injection seam: the controller runs
//! [`PgTools`] (shelling out to `pg_dump`/`psql`), tests substitute a fake
//! executor instead of invoking real binaries.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Resolved connection target for one database.
///
/// Built by the credential resolver from the database Secret and the
/// service reference; held only for the duration of one reconciliation.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseEndpoint {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for DatabaseEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Dump and restore operations against a database endpoint.
#[async_trait]
pub trait DumpExecutor: Send + Sync {
    /// Produce a dump of the full database contents at `dest`.
    ///
    /// The dump must be a self-contained, idempotently-restorable script:
    /// it drops and recreates objects and omits ownership and privilege
    /// statements, so it restores into a differently-provisioned target.
    async fn dump(&self, endpoint: &DatabaseEndpoint, dest: &Path) -> Result<()>;

    /// Apply the dump script at `source` against the database.
    ///
    /// A failed restore may leave the database in a partially-applied state;
    /// the caller reports it and retries only on a later reconciliation.
    async fn restore(&self, endpoint: &DatabaseEndpoint, source: &Path) -> Result<()>;
}

/// Executor backed by the PostgreSQL client tools (`pg_dump`, `psql`).
///
/// The password is passed via `PGPASSWORD` so it never appears in the
/// process argument list.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgTools;

#[async_trait]
impl DumpExecutor for PgTools {
    async fn dump(&self, endpoint: &DatabaseEndpoint, dest: &Path) -> Result<()> {
        let output = Command::new("pg_dump")
            .arg("-h")
            .arg(&endpoint.host)
            .arg("-p")
            .arg(endpoint.port.to_string())
            .arg("-U")
            .arg(&endpoint.username)
            .arg("-d")
            .arg(&endpoint.database)
            .arg("--clean")
            .arg("--if-exists")
            .arg("--no-owner")
            .arg("--no-privileges")
            .arg("-f")
            .arg(dest)
            .env("PGPASSWORD", &endpoint.password)
            .output()
            .await
            .context("failed to execute pg_dump")?;

        if !output.status.success() {
            bail!(
                "pg_dump failed with {}: {}",
                output.status,
                combined_output(&output)
            );
        }
        Ok(())
    }

    async fn restore(&self, endpoint: &DatabaseEndpoint, source: &Path) -> Result<()> {
        let output = Command::new("psql")
            .arg("-h")
            .arg(&endpoint.host)
            .arg("-p")
            .arg(endpoint.port.to_string())
            .arg("-U")
            .arg(&endpoint.username)
            .arg("-d")
            .arg(&endpoint.database)
            .arg("-f")
            .arg(source)
            .env("PGPASSWORD", &endpoint.password)
            .output()
            .await
            .context("failed to execute psql")?;

        if !output.status.success() {
            bail!(
                "psql restore failed with {}: {}",
                output.status,
                combined_output(&output)
            );
        }
        Ok(())
    }
}

/// Tool output for diagnostics; psql reports errors on stderr but some
/// client messages land on stdout.
fn combined_output(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut combined = stderr.trim().to_string();
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(stdout);
    }
    combined
}
