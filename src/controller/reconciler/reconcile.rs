//! # Reconciliation Logic
//!
//! Main reconciliation loop for PostgresSync resources.
//!
//! Each pass gates on the referenced StatefulSet before touching anything
//! else: a missing StatefulSet requeues slowly, an existing one with no
//! ready replicas requeues quickly. Once the workload is ready the pass
//! initializes the database from the stored dump (first ready pass) and
//! runs the dump workflow when the webhook trigger flag is set.

use k8s_openapi::api::apps::v1::StatefulSet;
use kube::Api;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::constants::{STATEFULSET_NOT_FOUND_REQUEUE_SECS, STATEFULSET_NOT_READY_REQUEUE_SECS};
use crate::crd::{PostgresSync, PostgresSyncPhase};
use crate::observability::metrics;

use super::dump::run_dump;
use super::restore::{run_restore, RestoreOutcome};
use super::status::{update_status, SyncPatcher};
use super::types::{Reconciler, ReconcilerError, WorkflowDeps};

/// Readiness of the StatefulSet hosting the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadGate {
    /// The StatefulSet does not exist yet
    Missing,
    /// The StatefulSet exists but has no ready replicas
    NotReady,
    /// At least one replica is ready
    Ready,
}

/// Classify the StatefulSet lookup result into a gate decision.
#[must_use]
pub fn workload_gate(stateful_set: Option<&StatefulSet>) -> WorkloadGate {
    match stateful_set {
        None => WorkloadGate::Missing,
        Some(sts) => {
            let ready = sts
                .status
                .as_ref()
                .and_then(|s| s.ready_replicas)
                .unwrap_or(0);
            if ready > 0 {
                WorkloadGate::Ready
            } else {
                WorkloadGate::NotReady
            }
        }
    }
}

/// Whether this resource still needs its first-pass restore.
///
/// Anything short of a recorded `Succeeded` phase counts: a resource that
/// failed part-way through initialization retries the restore.
#[must_use]
pub fn needs_initial_restore(sync: &PostgresSync) -> bool {
    sync.status.as_ref().and_then(|s| s.phase) != Some(PostgresSyncPhase::Succeeded)
}

/// Main reconciliation function.
///
/// Errors are handled by `error_policy()`; this function only records the
/// Failed phase before propagating them.
pub async fn reconcile(
    sync: Arc<PostgresSync>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    let name = sync.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = sync.metadata.namespace.as_deref().unwrap_or("default");

    let span = tracing::span!(
        tracing::Level::INFO,
        "reconcile",
        resource.name = name,
        resource.namespace = namespace,
        resource.kind = "PostgresSync"
    );
    let _guard = span.enter();

    metrics::increment_reconciliations();

    let sts_api: Api<StatefulSet> = Api::namespaced(ctx.client.clone(), namespace);
    let stateful_set = sts_api
        .get_opt(&sync.spec.stateful_set_ref.name)
        .await
        .map_err(|e| {
            ReconcilerError::ReconciliationFailed(anyhow::Error::new(e).context(format!(
                "failed to get StatefulSet {namespace}/{}",
                sync.spec.stateful_set_ref.name
            )))
        })?;

    match workload_gate(stateful_set.as_ref()) {
        WorkloadGate::Missing => {
            info!(
                stateful_set = %sync.spec.stateful_set_ref.name,
                "StatefulSet not found, waiting for it to be created"
            );
            if let Err(e) = update_status(
                ctx.patcher.as_ref(),
                &sync,
                PostgresSyncPhase::Pending,
                "waiting for StatefulSet to be created",
                None,
            )
            .await
            {
                warn!("failed to update status to Pending: {e:#}");
            }
            return Ok(Action::requeue(Duration::from_secs(
                STATEFULSET_NOT_FOUND_REQUEUE_SECS,
            )));
        }
        WorkloadGate::NotReady => {
            info!(
                stateful_set = %sync.spec.stateful_set_ref.name,
                "StatefulSet has no ready replicas yet"
            );
            if let Err(e) = update_status(
                ctx.patcher.as_ref(),
                &sync,
                PostgresSyncPhase::Pending,
                "waiting for StatefulSet to be ready",
                None,
            )
            .await
            {
                warn!("failed to update status to Pending: {e:#}");
            }
            return Ok(Action::requeue(Duration::from_secs(
                STATEFULSET_NOT_READY_REQUEUE_SECS,
            )));
        }
        WorkloadGate::Ready => {}
    }

    let action = run_ready_pass(
        ctx.workflow_deps(),
        ctx.patcher.as_ref(),
        &sync,
        namespace,
        name,
    )
    .await?;

    metrics::observe_reconcile_duration(start.elapsed());
    ctx.reset_backoff(namespace, name);
    Ok(action)
}

/// One pass against a ready database: the first-pass restore, then the dump
/// workflow when the trigger flag is set. A resource created with the flag
/// already set gets both in the same pass.
async fn run_ready_pass(
    deps: WorkflowDeps<'_>,
    patcher: &dyn SyncPatcher,
    sync: &PostgresSync,
    namespace: &str,
    name: &str,
) -> Result<Action, ReconcilerError> {
    if needs_initial_restore(sync) {
        initialize_database(deps, patcher, sync).await?;
    }

    if sync.spec.dump_on_webhook {
        dump_database(deps, patcher, sync, namespace, name).await?;
    }

    Ok(Action::await_change())
}

/// First ready pass: restore the stored dump into the fresh database.
async fn initialize_database(
    deps: WorkflowDeps<'_>,
    patcher: &dyn SyncPatcher,
    sync: &PostgresSync,
) -> Result<(), ReconcilerError> {
    if let Err(e) = update_status(
        patcher,
        sync,
        PostgresSyncPhase::InProgress,
        "initializing database from repository",
        None,
    )
    .await
    {
        warn!("failed to update status to InProgress: {e:#}");
    }

    match run_restore(deps, sync).await {
        Ok(outcome) => {
            let message = match outcome {
                RestoreOutcome::Restored => "database initialized from dump.sql",
                RestoreOutcome::NoDump => "ready - no existing dump found",
            };
            info!("{message}");
            update_status(patcher, sync, PostgresSyncPhase::Succeeded, message, None)
                .await
                .map_err(ReconcilerError::ReconciliationFailed)?;
            Ok(())
        }
        Err(e) => {
            error!("restore failed: {e:#}");
            if let Err(status_err) = update_status(
                patcher,
                sync,
                PostgresSyncPhase::Failed,
                &format!("restore failed: {e:#}"),
                None,
            )
            .await
            {
                warn!("failed to update status to Failed: {status_err:#}");
            }
            Err(ReconcilerError::ReconciliationFailed(e))
        }
    }
}

/// Webhook-triggered pass: dump the database and push it to the repository.
///
/// The trigger flag is only cleared after the dump has been pushed, so a
/// failed pass keeps the flag set and the retry produces the dump the
/// trigger asked for.
async fn dump_database(
    deps: WorkflowDeps<'_>,
    patcher: &dyn SyncPatcher,
    sync: &PostgresSync,
    namespace: &str,
    name: &str,
) -> Result<(), ReconcilerError> {
    if let Err(e) = update_status(
        patcher,
        sync,
        PostgresSyncPhase::InProgress,
        "dumping database to repository",
        None,
    )
    .await
    {
        warn!("failed to update status to InProgress: {e:#}");
    }

    match run_dump(deps, sync).await {
        Ok(()) => {
            patcher
                .clear_dump_trigger(namespace, name)
                .await
                .map_err(ReconcilerError::ReconciliationFailed)?;
            update_status(
                patcher,
                sync,
                PostgresSyncPhase::Succeeded,
                "database dump pushed to repository",
                Some(chrono::Utc::now().to_rfc3339()),
            )
            .await
            .map_err(ReconcilerError::ReconciliationFailed)?;
            Ok(())
        }
        Err(e) => {
            error!("dump failed: {e:#}");
            if let Err(status_err) = update_status(
                patcher,
                sync,
                PostgresSyncPhase::Failed,
                &format!("dump failed: {e:#}"),
                None,
            )
            .await
            {
                warn!("failed to update status to Failed: {status_err:#}");
            }
            Err(ReconcilerError::ReconciliationFailed(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::reconciler::testing::{
        sample_sync, FakeExecutor, FakePatcher, FakeRepository, FakeResolver, PatchEvent,
    };
    use crate::crd::PostgresSyncStatus;
    use k8s_openapi::api::apps::v1::StatefulSetStatus;

    fn stateful_set_with_ready(ready_replicas: Option<i32>) -> StatefulSet {
        StatefulSet {
            status: Some(StatefulSetStatus {
                ready_replicas,
                ..StatefulSetStatus::default()
            }),
            ..StatefulSet::default()
        }
    }

    fn succeeded_status() -> PostgresSyncStatus {
        PostgresSyncStatus {
            phase: Some(PostgresSyncPhase::Succeeded),
            message: Some("database initialized from dump.sql".to_string()),
            last_sync_time: None,
        }
    }

    #[test]
    fn gate_is_missing_without_a_stateful_set() {
        assert_eq!(workload_gate(None), WorkloadGate::Missing);
    }

    #[test]
    fn gate_is_not_ready_with_zero_ready_replicas() {
        let sts = stateful_set_with_ready(Some(0));
        assert_eq!(workload_gate(Some(&sts)), WorkloadGate::NotReady);

        // absent readyReplicas counts as zero
        let sts = stateful_set_with_ready(None);
        assert_eq!(workload_gate(Some(&sts)), WorkloadGate::NotReady);

        let sts = StatefulSet::default();
        assert_eq!(workload_gate(Some(&sts)), WorkloadGate::NotReady);
    }

    #[test]
    fn gate_is_ready_with_at_least_one_ready_replica() {
        let sts = stateful_set_with_ready(Some(1));
        assert_eq!(workload_gate(Some(&sts)), WorkloadGate::Ready);

        let sts = stateful_set_with_ready(Some(3));
        assert_eq!(workload_gate(Some(&sts)), WorkloadGate::Ready);
    }

    #[test]
    fn restore_is_needed_until_a_succeeded_phase_is_recorded() {
        let mut sync = sample_sync();
        assert!(needs_initial_restore(&sync));

        sync.status = Some(PostgresSyncStatus {
            phase: Some(PostgresSyncPhase::Pending),
            message: None,
            last_sync_time: None,
        });
        assert!(needs_initial_restore(&sync));

        sync.status = Some(PostgresSyncStatus {
            phase: Some(PostgresSyncPhase::Failed),
            message: None,
            last_sync_time: None,
        });
        assert!(needs_initial_restore(&sync));

        sync.status = Some(PostgresSyncStatus {
            phase: Some(PostgresSyncPhase::Succeeded),
            message: None,
            last_sync_time: None,
        });
        assert!(!needs_initial_restore(&sync));
    }

    #[tokio::test]
    async fn failed_dump_keeps_the_trigger_flag_set() {
        let mut sync = sample_sync();
        sync.spec.dump_on_webhook = true;
        sync.status = Some(succeeded_status());

        let repository = FakeRepository::default();
        let executor = FakeExecutor::failing_dump();
        let credentials = FakeResolver::default();
        let patcher = FakePatcher::default();
        let deps = WorkflowDeps {
            repository: &repository,
            executor: &executor,
            credentials: &credentials,
        };

        let result = run_ready_pass(deps, &patcher, &sync, "default", "orders-db").await;
        assert!(result.is_err());

        let events = patcher.events.lock().unwrap();
        assert!(
            !events.contains(&PatchEvent::TriggerCleared),
            "the trigger flag must survive a failed dump"
        );
        match events.last().unwrap() {
            PatchEvent::Status(status) => {
                assert_eq!(status.phase, Some(PostgresSyncPhase::Failed));
                assert!(status.last_sync_time.is_none());
            }
            PatchEvent::TriggerCleared => panic!("unexpected trigger clear"),
        }
    }

    #[tokio::test]
    async fn successful_dump_clears_the_trigger_before_recording_success() {
        let mut sync = sample_sync();
        sync.spec.dump_on_webhook = true;
        sync.status = Some(succeeded_status());

        let repository = FakeRepository::default();
        let executor = FakeExecutor::default();
        let credentials = FakeResolver::default();
        let patcher = FakePatcher::default();
        let deps = WorkflowDeps {
            repository: &repository,
            executor: &executor,
            credentials: &credentials,
        };

        let action = run_ready_pass(deps, &patcher, &sync, "default", "orders-db")
            .await
            .unwrap();
        assert_eq!(action, Action::await_change());

        let events = patcher.events.lock().unwrap();
        let cleared_at = events
            .iter()
            .position(|e| *e == PatchEvent::TriggerCleared)
            .expect("trigger flag should be cleared");
        let succeeded_at = events
            .iter()
            .position(|e| match e {
                PatchEvent::Status(status) => {
                    status.phase == Some(PostgresSyncPhase::Succeeded)
                        && status.last_sync_time.is_some()
                }
                PatchEvent::TriggerCleared => false,
            })
            .expect("success status with lastSyncTime should be recorded");
        assert!(
            cleared_at < succeeded_at,
            "trigger clear must precede the success status"
        );
    }

    #[tokio::test]
    async fn restore_and_triggered_dump_run_in_the_same_pass() {
        let mut sync = sample_sync();
        sync.spec.dump_on_webhook = true;

        let repository = FakeRepository::with_files(&[("dumps/dump.sql", "-- stored\n")]);
        let executor = FakeExecutor::default();
        let credentials = FakeResolver::default();
        let patcher = FakePatcher::default();
        let deps = WorkflowDeps {
            repository: &repository,
            executor: &executor,
            credentials: &credentials,
        };

        run_ready_pass(deps, &patcher, &sync, "default", "orders-db")
            .await
            .unwrap();

        assert_eq!(executor.restores.lock().unwrap().len(), 1);
        assert_eq!(executor.dumps.lock().unwrap().len(), 1);
        assert!(patcher
            .events
            .lock()
            .unwrap()
            .contains(&PatchEvent::TriggerCleared));
    }

    #[tokio::test]
    async fn failed_restore_skips_the_triggered_dump() {
        let mut sync = sample_sync();
        sync.spec.dump_on_webhook = true;

        let repository = FakeRepository::with_files(&[("dumps/dump.sql", "-- stored\n")]);
        let executor = FakeExecutor::failing_restore();
        let credentials = FakeResolver::default();
        let patcher = FakePatcher::default();
        let deps = WorkflowDeps {
            repository: &repository,
            executor: &executor,
            credentials: &credentials,
        };

        let result = run_ready_pass(deps, &patcher, &sync, "default", "orders-db").await;
        assert!(result.is_err());

        assert!(executor.dumps.lock().unwrap().is_empty());
        assert!(!patcher
            .events
            .lock()
            .unwrap()
            .contains(&PatchEvent::TriggerCleared));
    }
}
