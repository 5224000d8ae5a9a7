//! MySQL backend
//!
//! Decoding dispatches on the column type reported by the server. Exact numeric
//! and textual types (DECIMAL, JSON, ENUM, SET) are kept as text so that a value
//! written back is bit-for-bit what was read.

use super::sql::{select_all, Statement, TableRef};
use super::value::{Row, Scalar};
use super::{RowStore, StoreTransaction};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, MySql, Row as _, Transaction, TypeInfo, ValueRef};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Connect from discrete settings; `address` is `host` or `host:port`.
    pub async fn connect(
        address: &str,
        username: &str,
        password: &str,
        database: &str,
    ) -> Result<Self, StoreError> {
        let (host, port) = split_address(address)?;
        let options = MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .username(username)
            .password(password)
            .database(database)
            .charset("utf8mb4");
        debug!(host, port, database, "Connecting to MySQL store");
        Self::connect_with(options).await
    }

    pub async fn connect_url(url: &str) -> Result<Self, StoreError> {
        let options =
            MySqlConnectOptions::from_str(url).map_err(|e| StoreError::Connect(e.to_string()))?;
        Self::connect_with(options).await
    }

    async fn connect_with(options: MySqlConnectOptions) -> Result<Self, StoreError> {
        // One connection per reconciler: one transaction at a time, no
        // contention with other reconcilers.
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        Ok(Self { pool })
    }
}

fn split_address(address: &str) -> Result<(&str, u16), StoreError> {
    match address.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| StoreError::Connect(format!("invalid port in address {:?}", address)))?;
            Ok((host, port))
        }
        None => Ok((address, 3306)),
    }
}

fn bind(statement: &Statement) -> sqlx::query::Query<'_, MySql, MySqlArguments> {
    let mut query = sqlx::query(&statement.sql);
    for param in &statement.params {
        query = match param {
            Scalar::Null => query.bind(None::<String>),
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

/// Map a MySQL type name to the scalar variant it decodes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decoder {
    Signed,
    Unsigned,
    Float,
    Double,
    Text,
    Bytes,
    DateTime,
    Date,
    Time,
}

fn decoder_for(type_name: &str) -> Decoder {
    let unsigned = type_name.ends_with("UNSIGNED");
    let base = type_name.trim_end_matches(" UNSIGNED");
    match base {
        "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" if unsigned => {
            Decoder::Unsigned
        }
        "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            Decoder::Signed
        }
        "FLOAT" => Decoder::Float,
        "DOUBLE" => Decoder::Double,
        "DATETIME" | "TIMESTAMP" => Decoder::DateTime,
        "DATE" => Decoder::Date,
        "TIME" => Decoder::Time,
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => Decoder::Bytes,
        _ => Decoder::Text,
    }
}

fn decode_row(row: &MySqlRow) -> Result<Row, StoreError> {
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

        let decode_err = |reason: String| StoreError::Decode {
            column: name.clone(),
            type_name: type_name.clone(),
            reason,
        };
        let value = match decoder_for(&type_name) {
            Decoder::Signed => Scalar::Int(
                row.try_get_unchecked::<i64, _>(index)
                    .map_err(|e| decode_err(e.to_string()))?,
            ),
            Decoder::Unsigned => {
                let v = row
                    .try_get_unchecked::<u64, _>(index)
                    .map_err(|e| decode_err(e.to_string()))?;
                // Values beyond i64 keep their exact digits as text.
                i64::try_from(v)
                    .map(Scalar::Int)
                    .unwrap_or_else(|_| Scalar::Text(v.to_string()))
            }
            Decoder::Float => Scalar::Float(f64::from(
                row.try_get_unchecked::<f32, _>(index)
                    .map_err(|e| decode_err(e.to_string()))?,
            )),
            Decoder::Double => Scalar::Float(
                row.try_get_unchecked::<f64, _>(index)
                    .map_err(|e| decode_err(e.to_string()))?,
            ),
            Decoder::DateTime => Scalar::Timestamp(
                row.try_get_unchecked::<NaiveDateTime, _>(index)
                    .map_err(|e| decode_err(e.to_string()))?,
            ),
            Decoder::Date => {
                let date = row
                    .try_get_unchecked::<NaiveDate, _>(index)
                    .map_err(|e| decode_err(e.to_string()))?;
                Scalar::Timestamp(date.and_time(NaiveTime::default()))
            }
            Decoder::Time => {
                let time = row
                    .try_get_unchecked::<NaiveTime, _>(index)
                    .map_err(|e| decode_err(e.to_string()))?;
                Scalar::Text(time.format("%H:%M:%S%.f").to_string())
            }
            Decoder::Bytes => Scalar::Bytes(
                row.try_get_unchecked::<Vec<u8>, _>(index)
                    .map_err(|e| decode_err(e.to_string()))?,
            ),
            Decoder::Text => Scalar::Text(
                row.try_get_unchecked::<String, _>(index)
                    .map_err(|e| decode_err(e.to_string()))?,
            ),
        };
        decoded.insert(name, value);
    }
    Ok(decoded)
}

#[async_trait]
impl RowStore for MySqlStore {
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
        Ok(Box::new(MySqlTransaction { tx }))
    }
}

struct MySqlTransaction {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl StoreTransaction for MySqlTransaction {
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
