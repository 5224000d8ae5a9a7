//! Prune policy: every row except the sentinel is removed

use super::snapshot::RowSnapshot;
use crate::audit::{AuditEvent, AuditLog};
use crate::error::ReconcileError;
use crate::reconciler::{CycleReport, Reconciler};
use crate::store::sql::delete_except;
use crate::store::{RowKey, RowStore, TableRef};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Rows read this cycle, sentinel included
    pub scanned: usize,
    /// Rows written to the audit log before the delete
    pub logged: usize,
    /// Rows the delete statement reported as removed
    pub removed: u64,
}

pub struct PruneReconciler {
    name: String,
    store: Box<dyn RowStore>,
    table: TableRef,
    sentinel: RowKey,
    audit: AuditLog,
}

impl PruneReconciler {
    pub fn new(
        name: impl Into<String>,
        store: Box<dyn RowStore>,
        table: TableRef,
        sentinel: RowKey,
        audit: AuditLog,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            table,
            sentinel,
            audit,
        }
    }

    /// One prune pass.
    ///
    /// Every transient row is audited with its full content before a single
    /// `DELETE ... WHERE key <> sentinel` removes them all.
    pub async fn prune_cycle(&self) -> Result<PruneReport, ReconcileError> {
        let snapshot = RowSnapshot::capture(self.store.as_ref(), &self.table).await?;
        let mut report = PruneReport {
            scanned: snapshot.len(),
            ..PruneReport::default()
        };

        let transient: Vec<_> = snapshot
            .iter()
            .filter(|(key, _)| **key != self.sentinel)
            .collect();

        if transient.is_empty() {
            debug!(reconciler = %self.name, table = %self.table, "No transient rows");
            self.audit.record(&AuditEvent::PruneHeartbeat {
                table: self.table.to_string(),
            });
            return Ok(report);
        }

        for (key, row) in &transient {
            info!(
                reconciler = %self.name,
                table = %self.table,
                key = %key,
                "Pruning transient row"
            );
            self.audit.record(&AuditEvent::RowDeleted {
                table: self.table.to_string(),
                row: (*row).clone(),
            });
        }
        report.logged = transient.len();

        let statement = delete_except(&self.table, &self.sentinel);
        report.removed = self.store.execute(&statement).await?;

        // Rows inserted between the read and the delete are removed unlogged.
        if report.removed > report.logged as u64 {
            warn!(
                reconciler = %self.name,
                table = %self.table,
                logged = report.logged,
                removed = report.removed,
                "Prune removed more rows than were audited"
            );
        }

        self.audit.record(&AuditEvent::RowsPruned {
            table: self.table.to_string(),
            logged: report.logged,
            removed: report.removed,
        });
        info!(
            reconciler = %self.name,
            table = %self.table,
            removed = report.removed,
            "Prune complete"
        );
        Ok(report)
    }
}

#[async_trait]
impl Reconciler for PruneReconciler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run_cycle(&mut self) -> Result<CycleReport, ReconcileError> {
        self.prune_cycle().await.map(CycleReport::Prune)
    }
}
