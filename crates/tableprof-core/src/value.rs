//! Runtime values and column metadata as reported by a store driver

use chrono::{DateTime, Utc};
use std::fmt;

/// Portable SQL column type token emitted into synthesized DDL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Int,
    Text,
    Timestamptz,
    Numeric,
}

impl SqlType {
    /// The token as it appears in generated DDL
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Int => "int",
            SqlType::Text => "text",
            SqlType::Timestamptz => "timestamptz",
            SqlType::Numeric => "numeric",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// Runtime kind a driver scans a column into
///
/// This is the declared counterpart of [`SqlValue`]: when a scanned value is
/// null, the driver still knows which kind it would have produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Int,
    Float,
    Bool,
    Text,
    Timestamp,
    Bytes,
}

/// A single value scanned from a query result
///
/// Arbitrary-precision numeric columns arrive as `Bytes` - the driver hands
/// them over as the raw wire representation rather than a lossy float.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Timestamp(DateTime<Utc>),
    Bytes(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// The runtime kind of this value, `None` for null
    pub fn kind(&self) -> Option<ScanKind> {
        match self {
            SqlValue::Null => None,
            SqlValue::Int(_) => Some(ScanKind::Int),
            SqlValue::Float(_) => Some(ScanKind::Float),
            SqlValue::Bool(_) => Some(ScanKind::Bool),
            SqlValue::Text(_) => Some(ScanKind::Text),
            SqlValue::Timestamp(_) => Some(ScanKind::Timestamp),
            SqlValue::Bytes(_) => Some(ScanKind::Bytes),
        }
    }

    /// Stable textual form used to build keyed-lock and error keys
    pub fn key_repr(&self) -> String {
        match self {
            SqlValue::Null => "null".to_string(),
            SqlValue::Int(v) => v.to_string(),
            SqlValue::Float(v) => v.to_string(),
            SqlValue::Bool(v) => v.to_string(),
            SqlValue::Text(v) => v.clone(),
            SqlValue::Timestamp(v) => v.to_rfc3339(),
            SqlValue::Bytes(v) => format!("bytes:{}", v.len()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

/// Declared metadata for one column of a query result
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    /// Result column name (alias for aggregate and custom selects)
    pub name: String,

    /// Driver-reported type name, upper-cased (e.g. `INT4`, `NUMERIC`)
    pub type_name: String,

    /// Runtime kind the driver would scan this column into, when known
    pub scan_kind: Option<ScanKind>,
}

impl ColumnMeta {
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        scan_kind: Option<ScanKind>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            scan_kind,
        }
    }
}
