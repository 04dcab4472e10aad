//! # Status Updates
//!
//! Publishes phase transitions to the PostgresSync status subresource.
//!
//! Patches go through the [`SyncPatcher`] trait so the state machine can be
//! exercised in tests with a recording fake, the same way the repository,
//! executor and credential capabilities are injected.

use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use tracing::debug;

use crate::constants::FIELD_MANAGER;
use crate::crd::{PostgresSync, PostgresSyncPhase, PostgresSyncStatus};

/// Writes spec and status patches for a PostgresSync resource.
#[async_trait]
pub trait SyncPatcher: Send + Sync {
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &PostgresSyncStatus,
    ) -> Result<()>;

    /// Reset `spec.dumpOnWebhook` after a dump has been pushed.
    async fn clear_dump_trigger(&self, namespace: &str, name: &str) -> Result<()>;
}

/// Patcher backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeSyncPatcher {
    client: Client,
}

impl KubeSyncPatcher {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for KubeSyncPatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSyncPatcher").finish_non_exhaustive()
    }
}

#[async_trait]
impl SyncPatcher for KubeSyncPatcher {
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &PostgresSyncStatus,
    ) -> Result<()> {
        let api: Api<PostgresSync> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "status": status });

        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(patch),
        )
        .await
        .with_context(|| format!("failed to update status of {namespace}/{name}"))?;

        Ok(())
    }

    async fn clear_dump_trigger(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<PostgresSync> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "spec": { "dumpOnWebhook": false } });

        api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(patch),
        )
        .await
        .with_context(|| format!("failed to clear dump trigger on {namespace}/{name}"))?;

        Ok(())
    }
}

/// Patch the status subresource with a new phase and message.
///
/// The existing `lastSyncTime` is preserved unless a new one is given, and
/// an update that would not change the status is skipped to avoid feeding
/// spurious watch events back into the controller.
pub async fn update_status(
    patcher: &dyn SyncPatcher,
    sync: &PostgresSync,
    phase: PostgresSyncPhase,
    message: &str,
    last_sync_time: Option<String>,
) -> Result<()> {
    let name = sync.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = sync.metadata.namespace.as_deref().unwrap_or("default");

    let desired = PostgresSyncStatus {
        phase: Some(phase),
        message: Some(message.to_string()),
        last_sync_time: last_sync_time.or_else(|| {
            sync.status
                .as_ref()
                .and_then(|s| s.last_sync_time.clone())
        }),
    };

    if sync.status.as_ref() == Some(&desired) {
        debug!("skipping status update, phase {phase} unchanged");
        return Ok(());
    }

    patcher.patch_status(namespace, name, &desired).await
}
