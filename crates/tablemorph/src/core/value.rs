//! SQL value and row types for the execution boundary.
//!
//! Retrievers consume catalog rows through these types; they are the only
//! shape in which data crosses the [`SqlExecutor`](crate::core::traits::SqlExecutor)
//! boundary.

use chrono::NaiveDateTime;

use crate::error::{Result, SchemaError};

/// A single SQL value as returned by the execution facility.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// Whether this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
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

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

/// One result row: ordered column names paired with values.
///
/// Column lookup is case-insensitive because catalog views differ in the
/// casing they report.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    names: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Create a row from column names and values.
    ///
    /// The two slices must have equal length; mismatches are a caller bug.
    pub fn new<S: Into<String>>(names: Vec<S>, values: Vec<SqlValue>) -> Self {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    /// Look up a value by column name.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .map(|i| &self.values[i])
    }

    fn require(&self, name: &str) -> Result<&SqlValue> {
        self.get(name).ok_or_else(|| {
            SchemaError::Internal(format!("Result row has no column named \"{}\"", name))
        })
    }

    /// Get a text column. NULL or non-text values are an error.
    pub fn get_str(&self, name: &str) -> Result<&str> {
        match self.require(name)? {
            SqlValue::Text(s) => Ok(s),
            other => Err(SchemaError::Internal(format!(
                "Column \"{}\" is not text: {:?}",
                name, other
            ))),
        }
    }

    /// Get a text column that may be NULL.
    pub fn get_opt_str(&self, name: &str) -> Result<Option<&str>> {
        match self.require(name)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) => Ok(Some(s)),
            other => Err(SchemaError::Internal(format!(
                "Column \"{}\" is not text: {:?}",
                name, other
            ))),
        }
    }

    /// Get an integer column. NULL or non-integer values are an error.
    pub fn get_i64(&self, name: &str) -> Result<i64> {
        match self.require(name)? {
            SqlValue::Int(v) => Ok(*v),
            other => Err(SchemaError::Internal(format!(
                "Column \"{}\" is not an integer: {:?}",
                name, other
            ))),
        }
    }

    /// Get an integer column that may be NULL.
    pub fn get_opt_i64(&self, name: &str) -> Result<Option<i64>> {
        match self.require(name)? {
            SqlValue::Null => Ok(None),
            SqlValue::Int(v) => Ok(Some(*v)),
            other => Err(SchemaError::Internal(format!(
                "Column \"{}\" is not an integer: {:?}",
                name, other
            ))),
        }
    }

    /// Get a boolean column.
    ///
    /// Catalogs report booleans as native booleans, 0/1 integers, or
    /// "true"/"false" text depending on the engine; all three are accepted.
    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.require(name)? {
            SqlValue::Bool(v) => Ok(*v),
            SqlValue::Int(v) => Ok(*v != 0),
            SqlValue::Text(s) => {
                if s.eq_ignore_ascii_case("true") || s == "1" {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("false") || s == "0" {
                    Ok(false)
                } else {
                    Err(SchemaError::Internal(format!(
                        "Column \"{}\" is not a boolean: {:?}",
                        name, s
                    )))
                }
            }
            other => Err(SchemaError::Internal(format!(
                "Column \"{}\" is not a boolean: {:?}",
                name, other
            ))),
        }
    }
}
