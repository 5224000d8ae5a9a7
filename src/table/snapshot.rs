//! Keyed table snapshots

use crate::error::SnapshotError;
use crate::store::{Row, RowKey, RowStore, TableRef};
use std::collections::btree_map::{BTreeMap, Entry};

/// Full content of a table at one point in time, keyed by primary key
#[derive(Debug, Clone, PartialEq)]
pub struct RowSnapshot {
    table: TableRef,
    rows: BTreeMap<RowKey, Row>,
}

impl RowSnapshot {
    /// Read every row of `table` through `store`
    pub async fn capture(store: &dyn RowStore, table: &TableRef) -> Result<Self, SnapshotError> {
        let rows = store.fetch_rows(table).await?;
        Self::from_rows(table, rows)
    }

    /// Index rows by their key column.
    ///
    /// Fails on a missing key column, a null or float key, or a repeated key.
    pub fn from_rows(table: &TableRef, rows: Vec<Row>) -> Result<Self, SnapshotError> {
        let mut keyed = BTreeMap::new();
        for row in rows {
            let value = row
                .get(table.key.as_str())
                .ok_or_else(|| SnapshotError::MissingKey {
                    table: table.name().to_string(),
                    column: table.key.to_string(),
                })?;
            let key = RowKey::from_scalar(value).map_err(|kind| SnapshotError::UnsupportedKey {
                table: table.name().to_string(),
                kind,
            })?;
            match keyed.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(row);
                }
                Entry::Occupied(slot) => {
                    return Err(SnapshotError::DuplicateKey {
                        table: table.name().to_string(),
                        key: slot.key().to_string(),
                    });
                }
            }
        }
        Ok(Self {
            table: table.clone(),
            rows: keyed,
        })
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &RowKey) -> Option<&Row> {
        self.rows.get(key)
    }

    pub fn contains(&self, key: &RowKey) -> bool {
        self.rows.contains_key(key)
    }

    /// Rows in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = (&RowKey, &Row)> {
        self.rows.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &RowKey> {
        self.rows.keys()
    }
}
