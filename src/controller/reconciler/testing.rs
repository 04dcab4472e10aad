//! Test doubles for the injected workflow capabilities.

use anyhow::{bail, Result};
use async_trait::async_trait;
use kube::core::ObjectMeta;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::crd::{
    CredentialRef, DatabaseServiceRef, PostgresSync, PostgresSyncSpec, PostgresSyncStatus,
    StatefulSetRef,
};
use crate::executor::{DatabaseEndpoint, DumpExecutor};
use crate::git::{GitCredentials, PushOutcome, VersionedRepository};

use super::credentials::CredentialResolver;
use super::status::SyncPatcher;

/// A PostgresSync resource with the shape most tests need.
pub fn sample_sync() -> PostgresSync {
    PostgresSync {
        metadata: ObjectMeta {
            name: Some("orders-db".to_string()),
            namespace: Some("default".to_string()),
            ..ObjectMeta::default()
        },
        spec: PostgresSyncSpec {
            stateful_set_ref: StatefulSetRef {
                name: "postgres".to_string(),
            },
            database_service: DatabaseServiceRef {
                name: "postgres-service".to_string(),
                namespace: None,
            },
            repository_url: "https://example.com/dumps.git".to_string(),
            database_dump_path: None,
            git_credentials: CredentialRef {
                secret_name: "git-credentials".to_string(),
            },
            database_credentials: CredentialRef {
                secret_name: "db-credentials".to_string(),
            },
            dump_on_webhook: false,
        },
        status: None,
    }
}

/// In-memory repository: "cloning" materializes a fixed set of files into
/// the destination, pushes are recorded instead of sent anywhere.
#[derive(Debug, Default)]
pub struct FakeRepository {
    files: Vec<(String, String)>,
    fail_clone: bool,
    fail_push: bool,
    no_changes: bool,
    pub cloned_to: Mutex<Option<PathBuf>>,
    pub pushes: Mutex<Vec<String>>,
}

impl FakeRepository {
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(p, c)| ((*p).to_string(), (*c).to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing_clone() -> Self {
        Self {
            fail_clone: true,
            ..Self::default()
        }
    }

    pub fn failing_push() -> Self {
        Self {
            fail_push: true,
            ..Self::default()
        }
    }

    pub fn reporting_no_changes() -> Self {
        Self {
            no_changes: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl VersionedRepository for FakeRepository {
    async fn clone_into(&self, url: &str, _auth: &GitCredentials, dest: &Path) -> Result<()> {
        if self.fail_clone {
            bail!("failed to clone repository {url}");
        }
        *self.cloned_to.lock().unwrap() = Some(dest.to_path_buf());
        for (rel, contents) in &self.files {
            let path = dest.join(rel);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, contents).await?;
        }
        Ok(())
    }

    async fn commit_and_push(&self, _workdir: &Path, message: &str) -> Result<PushOutcome> {
        if self.fail_push {
            bail!("failed to push changes: remote rejected (non-fast-forward)");
        }
        if self.no_changes {
            return Ok(PushOutcome::NoChanges);
        }
        self.pushes.lock().unwrap().push(message.to_string());
        Ok(PushOutcome::Pushed)
    }
}

/// Executor that records invocations and writes a placeholder dump file.
#[derive(Debug, Default)]
pub struct FakeExecutor {
    fail_dump: bool,
    fail_restore: bool,
    pub dumps: Mutex<Vec<PathBuf>>,
    pub restores: Mutex<Vec<PathBuf>>,
}

impl FakeExecutor {
    pub fn failing_dump() -> Self {
        Self {
            fail_dump: true,
            ..Self::default()
        }
    }

    pub fn failing_restore() -> Self {
        Self {
            fail_restore: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl DumpExecutor for FakeExecutor {
    async fn dump(&self, _endpoint: &DatabaseEndpoint, dest: &Path) -> Result<()> {
        if self.fail_dump {
            bail!("pg_dump failed with exit status: 1: connection refused");
        }
        tokio::fs::write(dest, "-- dump\n").await?;
        self.dumps.lock().unwrap().push(dest.to_path_buf());
        Ok(())
    }

    async fn restore(&self, _endpoint: &DatabaseEndpoint, source: &Path) -> Result<()> {
        if self.fail_restore {
            bail!("psql restore failed with exit status: 1: syntax error");
        }
        self.restores.lock().unwrap().push(source.to_path_buf());
        Ok(())
    }
}

/// One spec or status patch observed by [`FakePatcher`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchEvent {
    Status(PostgresSyncStatus),
    TriggerCleared,
}

/// Patcher that records every patch instead of talking to the API server.
#[derive(Debug, Default)]
pub struct FakePatcher {
    pub events: Mutex<Vec<PatchEvent>>,
}

#[async_trait]
impl SyncPatcher for FakePatcher {
    async fn patch_status(
        &self,
        _namespace: &str,
        _name: &str,
        status: &PostgresSyncStatus,
    ) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(PatchEvent::Status(status.clone()));
        Ok(())
    }

    async fn clear_dump_trigger(&self, _namespace: &str, _name: &str) -> Result<()> {
        self.events.lock().unwrap().push(PatchEvent::TriggerCleared);
        Ok(())
    }
}

/// Resolver serving fixed credential bundles without a cluster.
#[derive(Debug)]
pub struct FakeResolver {
    missing_database: bool,
    pub endpoint_calls: Mutex<u32>,
}

impl Default for FakeResolver {
    fn default() -> Self {
        Self {
            missing_database: false,
            endpoint_calls: Mutex::new(0),
        }
    }
}

impl FakeResolver {
    pub fn without_database() -> Self {
        Self {
            missing_database: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl CredentialResolver for FakeResolver {
    async fn git_credentials(
        &self,
        _namespace: &str,
        _secret_name: &str,
    ) -> Result<GitCredentials> {
        Ok(GitCredentials {
            username: "bot".to_string(),
            password: "pw".to_string(),
        })
    }

    async fn database_endpoint(
        &self,
        _namespace: &str,
        secret_name: &str,
        service: &DatabaseServiceRef,
    ) -> Result<DatabaseEndpoint> {
        *self.endpoint_calls.lock().unwrap() += 1;
        if self.missing_database {
            bail!("database is required in secret {secret_name}");
        }
        Ok(DatabaseEndpoint {
            host: service.name.clone(),
            port: 5432,
            database: "orders".to_string(),
            username: "app".to_string(),
            password: "pw".to_string(),
        })
    }
}
