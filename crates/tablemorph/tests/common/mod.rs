//! Shared test harness: a scripted `SqlExecutor` that records every
//! statement and replays canned catalog rows.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use tablemorph::{Result, Row, SchemaError, SqlExecutor, SqlValue};

/// One canned response: all `patterns` must occur in the incoming SQL.
struct CannedResponse {
    patterns: Vec<String>,
    rows: Vec<Row>,
}

/// Scripted executor for tests.
///
/// `execute` records statements (and can be told to fail on a marker);
/// `query` replays the first canned response whose patterns all match.
#[derive(Default)]
pub struct MockExecutor {
    executed: Mutex<Vec<String>>,
    queried: Mutex<Vec<String>>,
    responses: Vec<CannedResponse>,
    fail_execute_on: Option<String>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay `rows` for any query containing all of `patterns`.
    pub fn on(mut self, patterns: &[&str], rows: Vec<Row>) -> Self {
        self.responses.push(CannedResponse {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            rows,
        });
        self
    }

    /// Make `execute` fail for any statement containing `marker`.
    pub fn fail_execute_on(mut self, marker: &str) -> Self {
        self.fail_execute_on = Some(marker.to_string());
        self
    }

    /// Statements passed to `execute`, in order (including a failing one).
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Queries passed to `query`, in order.
    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlExecutor for MockExecutor {
    async fn execute(&self, sql: &str) -> Result<i64> {
        self.executed.lock().unwrap().push(sql.to_string());
        if let Some(marker) = &self.fail_execute_on {
            if sql.contains(marker) {
                return Err(SchemaError::database(std::io::Error::other(format!(
                    "scripted failure on statement containing {:?}",
                    marker
                ))));
            }
        }
        Ok(0)
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        self.queried.lock().unwrap().push(sql.to_string());
        for response in &self.responses {
            if response.patterns.iter().all(|p| sql.contains(p.as_str())) {
                return Ok(response.rows.clone());
            }
        }
        Err(SchemaError::database(std::io::Error::other(format!(
            "no canned response for query: {}",
            sql
        ))))
    }
}

/// Build a row from column names and values.
pub fn row(names: &[&str], values: Vec<SqlValue>) -> Row {
    Row::new(names.to_vec(), values)
}

/// Shorthand constructors for canned values.
pub fn text(v: &str) -> SqlValue {
    SqlValue::Text(v.to_string())
}

pub fn int(v: i64) -> SqlValue {
    SqlValue::Int(v)
}

pub fn boolean(v: bool) -> SqlValue {
    SqlValue::Bool(v)
}

pub fn null() -> SqlValue {
    SqlValue::Null
}
