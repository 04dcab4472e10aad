//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! Failed passes requeue with per-resource Fibonacci backoff so one broken
//! resource never blocks progress on the others.

use kube_runtime::controller::Action;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError};
use crate::crd::PostgresSync;
use crate::observability;

/// Handle reconciliation errors with Fibonacci backoff.
///
/// Backoff state is keyed by `namespace/name` and cleared by the reconciler
/// after the next successful pass.
pub fn handle_reconciliation_error(
    obj: Arc<PostgresSync>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("reconciliation error for {namespace}/{name}: {error}");
    observability::metrics::increment_reconciliation_errors();

    let resource_key = format!("{namespace}/{name}");
    let (backoff_seconds, error_count) =
        next_backoff_for(&ctx.backoff_states, &resource_key);

    info!(
        "retrying {resource_key} in {backoff_seconds}s (error count: {error_count})"
    );

    Action::requeue(std::time::Duration::from_secs(backoff_seconds))
}

/// Advance the backoff sequence for one resource and return the delay plus
/// the accumulated error count.
fn next_backoff_for(
    backoff_states: &Mutex<HashMap<String, BackoffState>>,
    resource_key: &str,
) -> (u64, u32) {
    match backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(resource_key.to_string()).or_default();
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!("failed to lock backoff states: {e}, using default backoff");
            (60, 0)
        }
    }
}

/// Drop backoff entries whose resource no longer exists.
///
/// A resource deleted while failing never reaches the successful pass that
/// would clear its entry, so a periodic sweep against the set of live
/// `namespace/name` keys keeps the map bounded.
pub fn retain_backoff_states(
    backoff_states: &Mutex<HashMap<String, BackoffState>>,
    live: &HashSet<String>,
) {
    if let Ok(mut states) = backoff_states.lock() {
        states.retain(|key, _| live.contains(key));
    }
}
