//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for the trigger endpoint, metrics and probes
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Requeue interval while waiting for the StatefulSet to be created (seconds)
pub const STATEFULSET_NOT_FOUND_REQUEUE_SECS: u64 = 30;

/// Requeue interval while waiting for the StatefulSet to become ready (seconds)
pub const STATEFULSET_NOT_READY_REQUEUE_SECS: u64 = 10;

/// Default path within the repository where dumps are stored
pub const DEFAULT_DUMP_PATH: &str = "dumps";

/// File name of the dump artifact; overwritten on each dump, history is
/// provided by the repository's commit log rather than by file names
pub const DUMP_FILE_NAME: &str = "dump.sql";

/// Default PostgreSQL port when the credentials secret does not specify one
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Commit message used for every dump commit
pub const DUMP_COMMIT_MESSAGE: &str = "Updated database dump";

/// Fixed authorship identity for dump commits
pub const GIT_AUTHOR_NAME: &str = "postgres-sync-controller";

/// Fixed authorship email for dump commits
pub const GIT_AUTHOR_EMAIL: &str = "postgres-sync-controller@dbsync.io";

/// Field manager name used for server-side patches
pub const FIELD_MANAGER: &str = "postgres-sync-controller";

/// Minimum error backoff (minutes) for the Fibonacci sequence
pub const BACKOFF_MIN_MINUTES: u64 = 1;

/// Maximum error backoff (minutes) for the Fibonacci sequence
pub const BACKOFF_MAX_MINUTES: u64 = 10;

/// Interval (seconds) between sweeps dropping backoff state for deleted
/// resources
pub const BACKOFF_PRUNE_INTERVAL_SECS: u64 = 300;
