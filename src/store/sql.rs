//! Parameterized statement construction
//!
//! Identifiers are validated and backtick-quoted (accepted by both MySQL and
//! SQLite); values are always bound as `?` parameters. Column lists follow the
//! row's column-name order, so the same row always yields the same SQL text.

use super::value::{Row, RowKey, Scalar};
use crate::error::StoreError;
use std::fmt;

/// A validated SQL identifier (table or column name)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident(String);

impl Ident {
    /// Accepts ASCII letters, digits and `_`, not starting with a digit.
    pub fn new(name: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        };
        if valid && name.len() <= 64 {
            Ok(Ident(name))
        } else {
            Err(StoreError::InvalidIdentifier(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn quoted(&self) -> String {
        format!("`{}`", self.0)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A protected table and its primary-key column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub table: Ident,
    pub key: Ident,
}

impl TableRef {
    pub fn new(table: &str, key: &str) -> Result<Self, StoreError> {
        Ok(Self {
            table: Ident::new(table)?,
            key: Ident::new(key)?,
        })
    }

    pub fn name(&self) -> &str {
        self.table.as_str()
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table)
    }
}

/// SQL text plus its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Scalar>,
}

impl Statement {
    fn new(sql: String, params: Vec<Scalar>) -> Self {
        Self { sql, params }
    }
}

pub fn select_all(table: &TableRef) -> Statement {
    Statement::new(format!("SELECT * FROM {}", table.table.quoted()), Vec::new())
}

/// `DELETE ... WHERE key = ?`
pub fn delete_by_key(table: &TableRef, key: &RowKey) -> Statement {
    Statement::new(
        format!(
            "DELETE FROM {} WHERE {} = ?",
            table.table.quoted(),
            table.key.quoted()
        ),
        vec![key.to_scalar()],
    )
}

/// `DELETE ... WHERE key <> ?`: everything except the given row
pub fn delete_except(table: &TableRef, keep: &RowKey) -> Statement {
    Statement::new(
        format!(
            "DELETE FROM {} WHERE {} <> ?",
            table.table.quoted(),
            table.key.quoted()
        ),
        vec![keep.to_scalar()],
    )
}

/// Insert every column of `row`
pub fn insert_row(table: &TableRef, row: &Row) -> Result<Statement, StoreError> {
    let mut columns = Vec::with_capacity(row.len());
    let mut params = Vec::with_capacity(row.len());
    for (column, value) in row {
        columns.push(Ident::new(column.as_str())?.quoted());
        params.push(value.clone());
    }
    if columns.is_empty() {
        return Err(StoreError::Execute {
            sql: format!("INSERT INTO {}", table.table.quoted()),
            reason: "row has no columns".to_string(),
        });
    }

    let placeholders = vec!["?"; columns.len()].join(", ");
    Ok(Statement::new(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.table.quoted(),
            columns.join(", "),
            placeholders
        ),
        params,
    ))
}

/// Overwrite every non-key column of the row identified by `key`
pub fn update_row(table: &TableRef, key: &RowKey, row: &Row) -> Result<Statement, StoreError> {
    let mut assignments = Vec::with_capacity(row.len());
    let mut params = Vec::with_capacity(row.len() + 1);
    for (column, value) in row {
        if column == table.key.as_str() {
            continue;
        }
        assignments.push(format!("{} = ?", Ident::new(column.as_str())?.quoted()));
        params.push(value.clone());
    }
    if assignments.is_empty() {
        return Err(StoreError::Execute {
            sql: format!("UPDATE {}", table.table.quoted()),
            reason: "row has no columns besides the key".to_string(),
        });
    }
    params.push(key.to_scalar());

    Ok(Statement::new(
        format!(
            "UPDATE {} SET {} WHERE {} = ?",
            table.table.quoted(),
            assignments.join(", "),
            table.key.quoted()
        ),
        params,
    ))
}
