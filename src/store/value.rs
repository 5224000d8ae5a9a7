//! Dynamically typed column values
//!
//! Rows are read without schema knowledge, so every column value is decoded into
//! a [`Scalar`]. Equality over scalars is exact and type-aware: values of
//! different variants are never equal, even when they would render the same.

use chrono::NaiveDateTime;
use serde::ser::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp rendering used for logs and audit records
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single column value
#[derive(Debug, Clone)]
pub enum Scalar {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
}

/// One row: column name to value, ordered by column name
pub type Row = BTreeMap<String, Scalar>;

impl Scalar {
    /// Variant name, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Int(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::Text(_) => "text",
            Scalar::Bytes(_) => "bytes",
            Scalar::Timestamp(_) => "timestamp",
        }
    }
}

/// Floats compare by bit pattern: `NaN` equals an identical `NaN`, `0.0` and
/// `-0.0` differ. An `Int` never equals a `Float`.
impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => a.to_bits() == b.to_bits(),
            (Scalar::Text(a), Scalar::Text(b)) => a == b,
            (Scalar::Bytes(a), Scalar::Bytes(b)) => a == b,
            (Scalar::Timestamp(a), Scalar::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("NULL"),
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(v) => write!(f, "{:?}", v),
            Scalar::Bytes(v) => write!(f, "0x{}", hex::encode(v)),
            Scalar::Timestamp(v) => write!(f, "{}", v.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_none(),
            Scalar::Int(v) => serializer.serialize_i64(*v),
            Scalar::Float(v) => serializer.serialize_f64(*v),
            Scalar::Text(v) => serializer.serialize_str(v),
            Scalar::Bytes(v) => serializer.serialize_str(&format!("0x{}", hex::encode(v))),
            Scalar::Timestamp(v) => {
                serializer.serialize_str(&v.format(TIMESTAMP_FORMAT).to_string())
            }
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(i64::from(v))
    }
}

/// Booleans are stored as integers by both supported databases
impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Int(i64::from(v))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(v: Vec<u8>) -> Self {
        Scalar::Bytes(v)
    }
}

impl From<NaiveDateTime> for Scalar {
    fn from(v: NaiveDateTime) -> Self {
        Scalar::Timestamp(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Scalar::Null)
    }
}

/// Build a row from `(column, value)` pairs
pub fn row<I, K, V>(pairs: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Scalar>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Primary-key value identifying a row within a table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowKey {
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl RowKey {
    /// Convert a key column value. Returns the offending kind for null and
    /// float values, which cannot identify a row.
    pub fn from_scalar(value: &Scalar) -> Result<Self, &'static str> {
        match value {
            Scalar::Int(v) => Ok(RowKey::Int(*v)),
            Scalar::Text(v) => Ok(RowKey::Text(v.clone())),
            Scalar::Bytes(v) => Ok(RowKey::Bytes(v.clone())),
            other => Err(other.kind()),
        }
    }

    pub fn to_scalar(&self) -> Scalar {
        match self {
            RowKey::Int(v) => Scalar::Int(*v),
            RowKey::Text(v) => Scalar::Text(v.clone()),
            RowKey::Bytes(v) => Scalar::Bytes(v.clone()),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Int(v) => write!(f, "{}", v),
            RowKey::Text(v) => write!(f, "{:?}", v),
            RowKey::Bytes(v) => write!(f, "0x{}", hex::encode(v)),
        }
    }
}

impl From<i64> for RowKey {
    fn from(v: i64) -> Self {
        RowKey::Int(v)
    }
}
