//! Restore policy: the table is held to the baseline captured at start-up

use super::diff::{corrective_statement, diff, Drift, DriftRecord};
use super::snapshot::RowSnapshot;
use crate::audit::{AuditEvent, AuditLog};
use crate::error::ReconcileError;
use crate::reconciler::{CycleReport, Reconciler};
use crate::store::{RowStore, StoreTransaction, TableRef};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
}

impl RestoreReport {
    /// Corrective actions applied
    pub fn total(&self) -> usize {
        self.added + self.removed + self.modified
    }

    fn count(records: &[DriftRecord]) -> Self {
        let mut report = Self::default();
        for record in records {
            match record.drift {
                Drift::Added => report.added += 1,
                Drift::Removed => report.removed += 1,
                Drift::Modified { .. } => report.modified += 1,
            }
        }
        report
    }
}

pub struct RestoreReconciler {
    name: String,
    store: Box<dyn RowStore>,
    baseline: RowSnapshot,
    audit: AuditLog,
}

impl RestoreReconciler {
    /// Capture the baseline. Any failure here is fatal for the process.
    pub async fn initialize(
        name: impl Into<String>,
        store: Box<dyn RowStore>,
        table: TableRef,
        audit: AuditLog,
    ) -> Result<Self, ReconcileError> {
        let name = name.into();
        let baseline = RowSnapshot::capture(store.as_ref(), &table)
            .await
            .map_err(|e| ReconcileError::FatalInit {
                reconciler: name.clone(),
                reason: e.to_string(),
            })?;
        info!(
            reconciler = %name,
            table = %table,
            rows = baseline.len(),
            "Baseline captured"
        );
        Ok(Self {
            name,
            store,
            baseline,
            audit,
        })
    }

    pub fn baseline(&self) -> &RowSnapshot {
        &self.baseline
    }

    pub fn table(&self) -> &TableRef {
        self.baseline.table()
    }

    /// One restore pass: capture, diff, then replay every corrective action
    /// inside a single transaction.
    pub async fn restore_cycle(&self) -> Result<RestoreReport, ReconcileError> {
        let table = self.table();
        let current = RowSnapshot::capture(self.store.as_ref(), table).await?;
        let records = diff(&self.baseline, &current)?;
        if records.is_empty() {
            debug!(reconciler = %self.name, table = %table, "No drift");
            return Ok(RestoreReport::default());
        }

        let report = RestoreReport::count(&records);
        info!(
            reconciler = %self.name,
            table = %table,
            added = report.added,
            removed = report.removed,
            modified = report.modified,
            "Drift detected, restoring baseline"
        );

        let mut tx = self.store.begin().await?;
        for record in &records {
            self.record_drift(record, &current);
            let applied = match corrective_statement(table, record, &self.baseline) {
                Ok(statement) => tx.execute(&statement).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = applied {
                let reason = format!("key {}: {}", record.key, e);
                return Err(self.abort(tx, reason).await);
            }
        }

        if let Err(e) = tx.commit().await {
            self.audit.record(&AuditEvent::RestoreRolledBack {
                table: table.to_string(),
                reason: e.to_string(),
            });
            error!(reconciler = %self.name, table = %table, error = %e, "Restore commit failed");
            return Err(ReconcileError::Transaction {
                table: table.to_string(),
                reason: e.to_string(),
            });
        }

        self.audit.record(&AuditEvent::RestoreCommitted {
            table: table.to_string(),
            actions: report.total(),
        });
        info!(
            reconciler = %self.name,
            table = %table,
            actions = report.total(),
            "Baseline restored"
        );
        Ok(report)
    }

    async fn abort(&self, tx: Box<dyn StoreTransaction>, reason: String) -> ReconcileError {
        let table = self.table().to_string();
        if let Err(e) = tx.rollback().await {
            warn!(reconciler = %self.name, table = %table, error = %e, "Rollback failed");
        }
        self.audit.record(&AuditEvent::RestoreRolledBack {
            table: table.clone(),
            reason: reason.clone(),
        });
        error!(reconciler = %self.name, table = %table, reason = %reason, "Restore batch rolled back");
        ReconcileError::Transaction { table, reason }
    }

    fn record_drift(&self, record: &DriftRecord, current: &RowSnapshot) {
        let table = self.table().to_string();
        let key = record.key.to_string();
        let event = match &record.drift {
            Drift::Added => AuditEvent::DriftAdded {
                table,
                key,
                row: current.get(&record.key).cloned().unwrap_or_default(),
            },
            Drift::Removed => AuditEvent::DriftRemoved {
                table,
                key,
                row: self.baseline.get(&record.key).cloned().unwrap_or_default(),
            },
            Drift::Modified { changed } => AuditEvent::DriftModified {
                table,
                key,
                changed: changed.clone(),
                current: current.get(&record.key).cloned().unwrap_or_default(),
                baseline: self.baseline.get(&record.key).cloned().unwrap_or_default(),
            },
        };
        self.audit.record(&event);
    }
}

#[async_trait]
impl Reconciler for RestoreReconciler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run_cycle(&mut self) -> Result<CycleReport, ReconcileError> {
        self.restore_cycle().await.map(CycleReport::Restore)
    }
}
