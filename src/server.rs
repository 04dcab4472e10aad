//! # HTTP Server
//!
//! HTTP server for the dump webhook, metrics, and Kubernetes probes.
//!
//! Provides endpoints:
//! - `POST /dump/{namespace}/{name}` - Mark a PostgresSync for a dump pass
//! - `/metrics` - Prometheus metrics in text format
//! - `/healthz` - Liveness probe (always returns 200)
//! - `/readyz` - Readiness probe (returns 200 when the controller is ready)
//!
//! The webhook does not run the dump itself; it sets the trigger flag on the
//! resource spec and lets the reconciler pick the change up. Repeated calls
//! before the dump runs collapse into a single pass.

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::constants::FIELD_MANAGER;
use crate::crd::PostgresSync;
use crate::observability::metrics;

/// Failure modes of a webhook trigger request.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("PostgresSync {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },
    #[error("failed to set dump trigger: {0}")]
    Api(#[source] kube::Error),
}

/// Sets the dump trigger flag on a PostgresSync resource.
#[async_trait]
pub trait DumpTrigger: Send + Sync {
    async fn trigger_dump(&self, namespace: &str, name: &str) -> Result<(), TriggerError>;
}

/// Trigger backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeDumpTrigger {
    client: Client,
}

impl KubeDumpTrigger {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for KubeDumpTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeDumpTrigger").finish_non_exhaustive()
    }
}

#[async_trait]
impl DumpTrigger for KubeDumpTrigger {
    async fn trigger_dump(&self, namespace: &str, name: &str) -> Result<(), TriggerError> {
        let api: Api<PostgresSync> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "spec": { "dumpOnWebhook": true } });
        match api
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(response)) if response.code == 404 => {
                Err(TriggerError::NotFound {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                })
            }
            Err(e) => Err(TriggerError::Api(e)),
        }
    }
}

pub struct ServerState {
    pub is_ready: Arc<std::sync::atomic::AtomicBool>,
    pub trigger: Arc<dyn DumpTrigger>,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("is_ready", &self.is_ready)
            .finish_non_exhaustive()
    }
}

/// Build the router; separated from [`start_server`] so tests can drive it
/// without binding a socket.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/dump/{namespace}/{name}", post(dump_handler))
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(port: u16, state: Arc<ServerState>) -> Result<(), anyhow::Error> {
    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    info!("HTTP server listening on {addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn dump_handler(
    State(state): State<Arc<ServerState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.trigger.trigger_dump(&namespace, &name).await {
        Ok(()) => {
            metrics::increment_webhook_triggers();
            info!("dump triggered for {namespace}/{name}");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "dump triggered",
                    "resource": format!("{namespace}/{name}"),
                })),
            )
        }
        Err(e @ TriggerError::NotFound { .. }) => {
            warn!("{e}");
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        }
        Err(e) => {
            error!("{e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        }
    }
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        ),
        Err(e) => {
            error!("failed to encode metrics: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("failed to encode metrics: {e}"),
            )
        }
    }
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.is_ready.load(std::sync::atomic::Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
