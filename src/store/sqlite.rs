//! SQLite backend
//!
//! Values are decoded from their runtime storage class, so a column read twice
//! from unchanged data always yields the same scalars.

use super::sql::{select_all, Statement, TableRef};
use super::value::{Row, Scalar};
use super::{RowStore, StoreTransaction};
use crate::error::StoreError;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, Transaction, TypeInfo, ValueRef};
use std::str::FromStr;
use tracing::debug;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect with a single pooled connection; the database file is created
    /// when missing.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Connect(e.to_string()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        debug!(url, "Connected to SQLite store");
        Ok(Self { pool })
    }
}

fn bind(statement: &Statement) -> sqlx::query::Query<'_, Sqlite, SqliteArguments<'_>> {
    let mut query = sqlx::query(&statement.sql);
    for param in &statement.params {
        query = match param {
            Scalar::Null => query.bind(None::<i64>),
            Scalar::Int(v) => query.bind(*v),
            Scalar::Float(v) => query.bind(*v),
            Scalar::Text(v) => query.bind(v.as_str()),
            Scalar::Bytes(v) => query.bind(v.as_slice()),
            Scalar::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

fn exec_error(statement: &Statement, err: sqlx::Error) -> StoreError {
    StoreError::Execute {
        sql: statement.sql.clone(),
        reason: err.to_string(),
    }
}

fn decode_row(row: &SqliteRow) -> Result<Row, StoreError> {
    let mut decoded = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let raw = row.try_get_raw(index).map_err(|e| StoreError::Decode {
            column: name.clone(),
            type_name: "?".to_string(),
            reason: e.to_string(),
        })?;
        if raw.is_null() {
            decoded.insert(name, Scalar::Null);
            continue;
        }
        let type_name = raw.type_info().name().to_string();

        let decode_err = |e: sqlx::Error| StoreError::Decode {
            column: name.clone(),
            type_name: type_name.clone(),
            reason: e.to_string(),
        };
        let value = match type_name.as_str() {
            "INTEGER" | "BOOLEAN" => Scalar::Int(row.try_get_unchecked::<i64, _>(index).map_err(decode_err)?),
            "REAL" => Scalar::Float(row.try_get_unchecked::<f64, _>(index).map_err(decode_err)?),
            "BLOB" => Scalar::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index).map_err(decode_err)?),
            _ => Scalar::Text(row.try_get_unchecked::<String, _>(index).map_err(decode_err)?),
        };
        decoded.insert(name, value);
    }
    Ok(decoded)
}

#[async_trait]
impl RowStore for SqliteStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        Ok(())
    }

    async fn fetch_rows(&self, table: &TableRef) -> Result<Vec<Row>, StoreError> {
        let statement = select_all(table);
        // `SELECT *` must reflect the live column set, so it is never cached.
        let rows = sqlx::query(&statement.sql)
            .persistent(false)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Query {
                table: table.name().to_string(),
                reason: e.to_string(),
            })?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, StoreError> {
        let result = bind(statement)
            .execute(&self.pool)
            .await
            .map_err(|e| exec_error(statement, e))?;
        Ok(result.rows_affected())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Transaction(format!("begin: {}", e)))?;
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, StoreError> {
        let result = bind(statement)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| exec_error(statement, e))?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::Transaction(format!("commit: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StoreError::Transaction(format!("rollback: {}", e)))
    }
}
