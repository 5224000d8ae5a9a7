//! Error types for the Safeguard reconciliation engine.

use std::path::PathBuf;
use thiserror::Error;

/// Storage adapter errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to connect to store: {0}")]
    Connect(String),

    #[error("Query on table `{table}` failed: {reason}")]
    Query { table: String, reason: String },

    #[error("Statement failed: {reason} (sql: {sql})")]
    Execute { sql: String, reason: String },

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Cannot decode column `{column}` ({type_name}): {reason}")]
    Decode {
        column: String,
        type_name: String,
        reason: String,
    },

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Unsupported store url: {0}")]
    UnsupportedUrl(String),
}

/// Errors raised while capturing a table snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Row in `{table}` has no key column `{column}`")]
    MissingKey { table: String, column: String },

    #[error("Row in `{table}` has a key of unsupported type {kind} (null and float keys cannot identify rows)")]
    UnsupportedKey { table: String, kind: &'static str },

    #[error("Duplicate key {key} in `{table}`")]
    DuplicateKey { table: String, key: String },
}

/// Directory mirroring errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Source directory {0:?} does not exist or is not a directory")]
    MissingSource(PathBuf),

    #[error("Failed to walk {root:?}: {reason}")]
    Walk { root: PathBuf, reason: String },

    #[error("Failed to create directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy {from:?} to {to:?}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete {path:?}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reconciler-level errors
///
/// `FatalInit` is the only variant that terminates the process; every other
/// variant is scoped to a single cycle and retried at the next tick.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Initialization of `{reconciler}` failed: {reason}")]
    FatalInit { reconciler: String, reason: String },

    #[error("Snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Directory sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Restore batch on `{table}` rolled back: {reason}")]
    Transaction { table: String, reason: String },

    #[error("Column set of key {key} in `{table}` changed: baseline {baseline:?}, current {current:?}")]
    SchemaMismatch {
        table: String,
        key: String,
        baseline: Vec<String>,
        current: Vec<String>,
    },

    #[error("Cycle task aborted: {0}")]
    Aborted(String),
}

impl ReconcileError {
    /// Whether this error must stop the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReconcileError::FatalInit { .. })
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Failed to write configuration to {path:?}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}
