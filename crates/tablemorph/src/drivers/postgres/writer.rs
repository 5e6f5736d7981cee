//! PostgreSQL schema writer (not implemented).
//!
//! The Postgres backend is read-partial only; every mutation reports
//! `NotSupported`. The structure is in place so that implementing it later
//! is a matter of filling in the dialect pieces.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::schema::{IndexInfo, SchemaInfo, TableInfo};
use crate::core::traits::{SchemaWriter, SqlExecutor, StatementLog};
use crate::core::transform::RebuildPlan;
use crate::core::types::{DbEngine, TypeInfo};
use crate::error::{Result, SchemaError};

/// Placeholder writer for PostgreSQL.
pub struct PostgresWriter {
    executor: Option<Arc<dyn SqlExecutor>>,
    log: Option<StatementLog>,
}

impl PostgresWriter {
    pub fn new(executor: Option<Arc<dyn SqlExecutor>>) -> Self {
        Self {
            executor,
            log: None,
        }
    }

    pub fn with_log(mut self, log: StatementLog) -> Self {
        self.log = Some(log);
        self
    }

    fn unimplemented(operation: &str) -> SchemaError {
        SchemaError::NotSupported(format!(
            "{} is not implemented for the Postgres backend",
            operation
        ))
    }
}

#[async_trait]
impl SchemaWriter for PostgresWriter {
    fn engine(&self) -> DbEngine {
        DbEngine::Postgres
    }

    fn executor(&self) -> Option<&dyn SqlExecutor> {
        self.executor.as_deref()
    }

    fn log(&self) -> Option<&StatementLog> {
        self.log.as_ref()
    }

    fn type_to_sql(&self, _ty: &TypeInfo) -> Result<String> {
        Err(Self::unimplemented("Type rendering"))
    }

    fn autoincrement_suffix(&self) -> &'static str {
        // Unused: every DDL-producing path errors before reaching this.
        ""
    }

    fn sql_length(&self, expr: &str) -> String {
        format!("length({})", expr)
    }

    async fn create_schema(&self, _schema: &SchemaInfo) -> Result<()> {
        Err(Self::unimplemented("create_schema"))
    }

    async fn create_table(&self, _table: &TableInfo) -> Result<()> {
        Err(Self::unimplemented("create_table"))
    }

    async fn create_index(&self, _table: &TableInfo, _index: &IndexInfo) -> Result<()> {
        Err(Self::unimplemented("create_index"))
    }

    async fn rename_table(&self, _table: &TableInfo, _new_name: &str) -> Result<()> {
        Err(Self::unimplemented("rename_table"))
    }

    async fn delete_table(&self, _table: &TableInfo) -> Result<()> {
        Err(Self::unimplemented("delete_table"))
    }

    async fn rebuild_table(
        &self,
        _schema: &SchemaInfo,
        _table: &TableInfo,
        _plan: &RebuildPlan,
    ) -> Result<()> {
        Err(Self::unimplemented("transform_table"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_mutations_report_not_supported() {
        let writer = PostgresWriter::new(None);
        let schema = SchemaInfo::new();
        assert!(matches!(
            writer.create_schema(&schema).await,
            Err(SchemaError::NotSupported(_))
        ));
        let table = TableInfo::new("T");
        assert!(matches!(
            writer.create_table(&table).await,
            Err(SchemaError::NotSupported(_))
        ));
        assert!(matches!(
            writer.delete_table(&table).await,
            Err(SchemaError::NotSupported(_))
        ));
    }

    #[test]
    fn test_sql_length_is_available() {
        let writer = PostgresWriter::new(None);
        assert_eq!(writer.sql_length("oldtable.[x]"), "length(oldtable.[x])");
    }
}
