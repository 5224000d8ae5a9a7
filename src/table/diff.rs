//! Baseline/current comparison and the statements that undo drift

use super::snapshot::RowSnapshot;
use crate::error::{ReconcileError, StoreError};
use crate::store::sql::{delete_by_key, insert_row, update_row};
use crate::store::{Row, RowKey, Statement, TableRef};

/// How one key deviates from the baseline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    /// Present now, absent from the baseline
    Added,
    /// In the baseline, gone now
    Removed,
    /// Present in both with at least one differing column
    Modified { changed: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftRecord {
    pub key: RowKey,
    pub drift: Drift,
}

/// Compare `current` against `baseline`.
///
/// Records come out grouped as added, removed, modified; each group in
/// ascending key order. A key whose column set differs between the two
/// snapshots is a [`ReconcileError::SchemaMismatch`] and fails the whole diff.
pub fn diff(
    baseline: &RowSnapshot,
    current: &RowSnapshot,
) -> Result<Vec<DriftRecord>, ReconcileError> {
    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut modified = Vec::new();

    for key in current.keys() {
        if !baseline.contains(key) {
            added.push(DriftRecord {
                key: key.clone(),
                drift: Drift::Added,
            });
        }
    }

    for (key, baseline_row) in baseline.iter() {
        let Some(current_row) = current.get(key) else {
            removed.push(DriftRecord {
                key: key.clone(),
                drift: Drift::Removed,
            });
            continue;
        };

        if !baseline_row.keys().eq(current_row.keys()) {
            return Err(ReconcileError::SchemaMismatch {
                table: baseline.table().name().to_string(),
                key: key.to_string(),
                baseline: baseline_row.keys().cloned().collect(),
                current: current_row.keys().cloned().collect(),
            });
        }

        let changed: Vec<String> = baseline_row
            .iter()
            .filter(|(column, value)| current_row.get(*column) != Some(*value))
            .map(|(column, _)| column.clone())
            .collect();
        if !changed.is_empty() {
            modified.push(DriftRecord {
                key: key.clone(),
                drift: Drift::Modified { changed },
            });
        }
    }

    added.extend(removed);
    added.extend(modified);
    Ok(added)
}

/// The statement that brings `record.key` back to its baseline state
pub fn corrective_statement(
    table: &TableRef,
    record: &DriftRecord,
    baseline: &RowSnapshot,
) -> Result<Statement, StoreError> {
    let baseline_row = |key: &RowKey| -> Result<&Row, StoreError> {
        baseline.get(key).ok_or_else(|| StoreError::Execute {
            sql: String::new(),
            reason: format!("key {} missing from baseline", key),
        })
    };

    match &record.drift {
        Drift::Added => Ok(delete_by_key(table, &record.key)),
        Drift::Removed => insert_row(table, baseline_row(&record.key)?),
        Drift::Modified { .. } => update_row(table, &record.key, baseline_row(&record.key)?),
    }
}
