//! # PostgresSync Controller
//!
//! A Kubernetes controller that keeps a StatefulSet-hosted PostgreSQL
//! database in sync with a git repository of SQL dumps.
//!
//! ## Overview
//!
//! 1. **Watching PostgresSync resources** - Reconciles resources across all
//!    namespaces, gated on the readiness of the referenced StatefulSet
//! 2. **Restore on first readiness** - Clones the configured repository and
//!    applies the stored `dump.sql` to the freshly-ready database
//! 3. **Dump on webhook trigger** - `POST /dump/{namespace}/{name}` marks
//!    the resource; the next pass runs `pg_dump`, commits and pushes
//! 4. **Prometheus metrics** - Exposes reconcile, dump and restore counters
//! 5. **Health probes** - HTTP endpoints for liveness and readiness checks

use anyhow::{Context, Result};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::{Api, Client};
use kube_runtime::{watcher, Controller};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};

use postgres_sync_controller::constants::{BACKOFF_PRUNE_INTERVAL_SECS, DEFAULT_HTTP_PORT};
use postgres_sync_controller::controller::reconciler::{self, syncs_for_stateful_set, Reconciler};
use postgres_sync_controller::crd::PostgresSync;
use postgres_sync_controller::observability::metrics;
use postgres_sync_controller::runtime::{handle_reconciliation_error, retain_backoff_states};
use postgres_sync_controller::server::{start_server, KubeDumpTrigger, ServerState};

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postgres_sync_controller=info".into()),
        )
        .init();

    info!(
        "Starting PostgresSync Controller {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_GIT_HASH")
    );

    metrics::register_metrics()?;

    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        trigger: Arc::new(KubeDumpTrigger::new(client.clone())),
    });

    let server_port = std::env::var("HTTP_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_HTTP_PORT);

    let server_state_clone = server_state.clone();
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {e:#}");
        }
    });

    // Watch PostgresSync resources in all namespaces
    let syncs: Api<PostgresSync> = Api::all(client.clone());
    let stateful_sets: Api<StatefulSet> = Api::all(client.clone());

    let reconciler = Arc::new(Reconciler::new(client));

    let controller = Controller::new(syncs, watcher::Config::default());
    let store = controller.store();

    // Backoff entries for resources deleted while failing would otherwise
    // linger for the lifetime of the process
    let prune_store = store.clone();
    let prune_states = reconciler.backoff_states.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(BACKOFF_PRUNE_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let live: HashSet<String> = prune_store
                .state()
                .iter()
                .filter_map(|sync| {
                    Some(format!(
                        "{}/{}",
                        sync.metadata.namespace.as_deref()?,
                        sync.metadata.name.as_deref()?
                    ))
                })
                .collect();
            retain_backoff_states(&prune_states, &live);
        }
    });

    server_state
        .is_ready
        .store(true, std::sync::atomic::Ordering::Relaxed);

    controller
        // StatefulSet readiness transitions re-trigger the referencing resources
        .watches(stateful_sets, watcher::Config::default(), move |sts| {
            syncs_for_stateful_set(&store, &sts)
        })
        .shutdown_on_signal()
        .run(
            reconciler::reconcile,
            handle_reconciliation_error,
            reconciler,
        )
        .for_each(|result| {
            if let Err(e) = result {
                error!("controller stream error: {e}");
            }
            std::future::ready(())
        })
        .await;

    info!("Controller stopped");

    Ok(())
}
