//! Relational store access
//!
//! Reconcilers talk to the database through [`RowStore`], which covers exactly
//! what they need: read a whole table, run a parameterized statement, and group
//! statements into a transaction. Backends are built on sqlx.

pub mod mysql;
pub mod sql;
pub mod sqlite;
pub mod value;

use crate::error::StoreError;
use async_trait::async_trait;

pub use mysql::MySqlStore;
pub use sql::{Ident, Statement, TableRef};
pub use sqlite::SqliteStore;
pub use value::{Row, RowKey, Scalar};

/// Handle to one database connection pool
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Round-trip to check the store is reachable
    async fn ping(&self) -> Result<(), StoreError>;

    /// Every row of `table`, all columns
    async fn fetch_rows(&self, table: &TableRef) -> Result<Vec<Row>, StoreError>;

    /// Run a statement outside of any explicit transaction; returns affected rows
    async fn execute(&self, statement: &Statement) -> Result<u64, StoreError>;

    /// Start a transaction
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

/// An open transaction. Dropping it without `commit` rolls it back.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Where to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    /// `mysql://` or `sqlite:` url
    Url(String),
    /// Discrete MySQL settings
    MySql {
        address: String,
        username: String,
        password: String,
        database: String,
    },
}

/// Open a dedicated store handle for one reconciler
pub async fn connect_store(target: &StoreTarget) -> Result<Box<dyn RowStore>, StoreError> {
    match target {
        StoreTarget::Url(url) if url.starts_with("mysql:") => {
            Ok(Box::new(MySqlStore::connect_url(url).await?))
        }
        StoreTarget::Url(url) if url.starts_with("sqlite:") => {
            Ok(Box::new(SqliteStore::connect(url).await?))
        }
        StoreTarget::Url(url) => Err(StoreError::UnsupportedUrl(redact(url))),
        StoreTarget::MySql {
            address,
            username,
            password,
            database,
        } => Ok(Box::new(
            MySqlStore::connect(address, username, password, database).await?,
        )),
    }
}

/// Strip credentials from a url before it reaches a log line
pub fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
