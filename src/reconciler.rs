//! The reconciliation contract shared by every protected resource

use crate::error::ReconcileError;
use crate::mirror::{DirectoryMirror, SyncReport};
use crate::table::{PruneReport, RestoreReport};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Outcome of one successful cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleReport {
    Mirror(SyncReport),
    Prune(PruneReport),
    Restore(RestoreReport),
}

impl CycleReport {
    /// Whether the cycle had to correct anything
    pub fn corrected(&self) -> bool {
        match self {
            CycleReport::Mirror(r) => r.copied + r.deleted > 0,
            CycleReport::Prune(r) => r.removed > 0,
            CycleReport::Restore(r) => r.total() > 0,
        }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleReport::Mirror(r) => write!(
                f,
                "{} files: {} copied, {} unchanged, {} deleted",
                r.total, r.copied, r.unchanged, r.deleted
            ),
            CycleReport::Prune(r) => write!(
                f,
                "{} rows scanned, {} logged, {} removed",
                r.scanned, r.logged, r.removed
            ),
            CycleReport::Restore(r) => write!(
                f,
                "{} deleted, {} re-inserted, {} updated",
                r.added, r.removed, r.modified
            ),
        }
    }
}

/// A snapshot-diff-correct loop over one resource.
///
/// Implementations own their reference state and their storage handle; a cycle
/// never observes another reconciler.
#[async_trait]
pub trait Reconciler: Send {
    fn name(&self) -> &str;

    /// Run one full cycle. Errors are scoped to this cycle.
    async fn run_cycle(&mut self) -> Result<CycleReport, ReconcileError>;
}

#[async_trait]
impl Reconciler for DirectoryMirror {
    fn name(&self) -> &str {
        DirectoryMirror::name(self)
    }

    async fn run_cycle(&mut self) -> Result<CycleReport, ReconcileError> {
        let mirror = self.clone();
        let report = tokio::task::spawn_blocking(move || mirror.sync())
            .await
            .map_err(|e| ReconcileError::Aborted(e.to_string()))??;
        Ok(CycleReport::Mirror(report))
    }
}
