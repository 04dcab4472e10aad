//! # Types
//!
//! Core types for the reconciler.

use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::credentials::{CredentialResolver, SecretCredentialResolver};
use crate::controller::reconciler::status::{KubeSyncPatcher, SyncPatcher};
use crate::executor::{DumpExecutor, PgTools};
use crate::git::{GitCli, VersionedRepository};

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Reconciliation failed: {0}")]
    ReconciliationFailed(#[from] anyhow::Error),
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::new(
                crate::constants::BACKOFF_MIN_MINUTES,
                crate::constants::BACKOFF_MAX_MINUTES,
            ),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new()
    }
}

/// The injected capabilities one workflow invocation runs against.
///
/// Borrowed from the [`Reconciler`] for the duration of a single pass;
/// tests construct it directly over fakes.
#[derive(Clone, Copy)]
pub struct WorkflowDeps<'a> {
    pub repository: &'a dyn VersionedRepository,
    pub executor: &'a dyn DumpExecutor,
    pub credentials: &'a dyn CredentialResolver,
}

impl std::fmt::Debug for WorkflowDeps<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowDeps").finish_non_exhaustive()
    }
}

/// Shared reconciliation context: the Kubernetes client plus the injected
/// repository, executor, credential and patch capabilities.
///
/// No mutable state is shared across passes except the per-resource backoff
/// bookkeeping consumed by the error policy.
#[derive(Clone)]
pub struct Reconciler {
    pub client: Client,
    pub repository: Arc<dyn VersionedRepository>,
    pub executor: Arc<dyn DumpExecutor>,
    pub credentials: Arc<dyn CredentialResolver>,
    pub patcher: Arc<dyn SyncPatcher>,
    // Backoff state per resource (identified by namespace/name),
    // maintained by the error_policy() layer
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Production wiring: command-line git, PostgreSQL client tools, and
    /// Secret-backed credential resolution.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            credentials: Arc::new(SecretCredentialResolver::new(client.clone())),
            patcher: Arc::new(KubeSyncPatcher::new(client.clone())),
            client,
            repository: Arc::new(GitCli),
            executor: Arc::new(PgTools),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn workflow_deps(&self) -> WorkflowDeps<'_> {
        WorkflowDeps {
            repository: self.repository.as_ref(),
            executor: self.executor.as_ref(),
            credentials: self.credentials.as_ref(),
        }
    }

    /// Forget the error backoff for a resource after a successful pass.
    pub fn reset_backoff(&self, namespace: &str, name: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(&format!("{namespace}/{name}"));
        }
    }
}
