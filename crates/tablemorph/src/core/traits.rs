//! Core traits: the execution boundary, schema retrieval and schema mutation.
//!
//! - [`SqlExecutor`]: an open connection able to execute SQL text and return
//!   affected-row counts or result rows. Concrete implementations live with
//!   the host application; this crate only consumes the trait.
//! - [`SchemaReader`]: reconstructs the schema graph from a live catalog.
//! - [`SchemaWriter`]: synthesizes DDL from the schema graph, including the
//!   rebuild-and-copy table transform.
//!
//! Default trait methods carry the dialect-independent algorithm skeletons
//! (table composition, `CREATE TABLE` assembly, transform planning);
//! driver modules supply the per-engine pieces.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use crate::core::identifier::{quote, quote_list};
use crate::core::schema::{ColumnInfo, ForeignKeyInfo, IndexInfo, SchemaInfo, TableInfo};
use crate::core::transform::{RebuildPlan, TableTransform};
use crate::core::types::{BasicType, DbEngine, DbEngines, TypeInfo};
use crate::core::value::Row;
use crate::error::{Result, SchemaError};

/// An open connection capable of executing SQL text.
///
/// Implementations are expected to be internally synchronized (`&self`
/// receivers), like a pooled client. The engine drives one logical operation
/// at a time per connection; concurrent calls against the same connection
/// are a caller error.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute a statement, returning the affected-row count.
    async fn execute(&self, sql: &str) -> Result<i64>;

    /// Execute a query, returning all result rows.
    async fn query(&self, sql: &str) -> Result<Vec<Row>>;
}

/// A sink collecting every SQL statement a [`SchemaWriter`] emits, in order.
///
/// Useful for reviewing or diffing generated DDL, and the only output of a
/// writer running without a bound executor.
#[derive(Debug, Clone, Default)]
pub struct StatementLog {
    statements: Arc<Mutex<Vec<String>>>,
}

impl StatementLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement.
    pub fn push(&self, sql: &str) {
        self.lock().push(sql.to_string());
    }

    /// A snapshot of all statements logged so far.
    pub fn statements(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Drain and return all statements logged so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        // A poisoned log only ever holds statement text; keep it usable.
        self.statements
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Reconstructs the schema graph by introspecting a live database.
#[async_trait]
pub trait SchemaReader: Send + Sync {
    /// The engine this reader introspects.
    fn engine(&self) -> DbEngine;

    /// Retrieve every user table, fully formed, ordered by name.
    async fn retrieve_tables(&self) -> Result<Vec<TableInfo>>;

    /// Retrieve the columns of one table, in ordinal order.
    async fn retrieve_columns(&self, table_name: &str) -> Result<Vec<ColumnInfo>>;

    /// Retrieve the indexes of one table.
    async fn retrieve_indexes(&self, table_name: &str) -> Result<Vec<IndexInfo>>;

    /// Retrieve the foreign keys of one table.
    async fn retrieve_foreign_keys(&self, table_name: &str) -> Result<Vec<ForeignKeyInfo>>;

    /// Compose the column/index/foreign-key queries into a validated table.
    async fn retrieve_table(&self, table_name: &str) -> Result<TableInfo> {
        let mut table = TableInfo::new(table_name);
        for column in self.retrieve_columns(table_name).await? {
            table.add_column(column)?;
        }
        for index in self.retrieve_indexes(table_name).await? {
            table.add_index(index)?;
        }
        for foreign_key in self.retrieve_foreign_keys(table_name).await? {
            table.add_foreign_key(foreign_key)?;
        }
        table.validate()?;
        Ok(table)
    }

    /// Retrieve the whole schema and validate it against `supported_engines`.
    async fn retrieve_schema(&self, supported_engines: DbEngines) -> Result<SchemaInfo> {
        let mut schema = SchemaInfo::new();
        for table in self.retrieve_tables().await? {
            schema.add_table(table)?;
        }
        schema.validate(supported_engines)?;
        debug!(engine = self.engine().name(), "retrieved {}", schema);
        Ok(schema)
    }
}

/// Synthesizes and executes DDL from the schema graph.
///
/// A writer may be constructed without an executor; it then produces DDL
/// into its [`StatementLog`] without touching any database. Schema-graph
/// validation still runs in that mode.
#[async_trait]
pub trait SchemaWriter: Send + Sync {
    /// The engine this writer targets.
    fn engine(&self) -> DbEngine;

    /// The bound connection, if any.
    fn executor(&self) -> Option<&dyn SqlExecutor>;

    /// The statement sink, if one is configured.
    fn log(&self) -> Option<&StatementLog>;

    /// Render a column type in this dialect's SQL, including nullability.
    fn type_to_sql(&self, ty: &TypeInfo) -> Result<String>;

    /// The keyword(s) appended to an autoincrementing primary-key column.
    fn autoincrement_suffix(&self) -> &'static str;

    /// A SQL fragment computing the length of `expr` in this dialect.
    fn sql_length(&self, expr: &str) -> String;

    /// Log a statement and execute it against the bound connection.
    ///
    /// Returns the affected-row count, or -1 without touching the database
    /// when no connection is bound.
    async fn execute_sql(&self, sql: &str) -> Result<i64> {
        if let Some(log) = self.log() {
            log.push(sql);
        }
        debug!(engine = self.engine().name(), "executing SQL: {}", sql);
        match self.executor() {
            Some(executor) => executor.execute(sql).await,
            None => Ok(-1),
        }
    }

    /// Assemble the `CREATE TABLE` statement for `table`: columns, primary
    /// key (inline when single-column, else a named table constraint),
    /// unique constraints, and optionally the foreign keys inline.
    fn create_table_sql(&self, table: &TableInfo, include_foreign_keys: bool) -> Result<String> {
        let mut sql = format!("CREATE TABLE {} (\n", quote(&table.name)?);
        let mut pk = table.primary_key();
        let mut first = true;
        for column in table.columns() {
            if !first {
                sql.push_str(",\n");
            }
            first = false;
            sql.push_str(&format!(
                "  {} {}",
                quote(&column.name)?,
                self.type_to_sql(&column.ty)?
            ));
            if let Some(p) = pk {
                if p.column_names.len() == 1 && table.is_pk_column(&column.name) {
                    sql.push_str(&format!(" CONSTRAINT {} PRIMARY KEY", quote(&p.name)?));
                    if column.ty.basic_type == BasicType::Autoincrement {
                        sql.push(' ');
                        sql.push_str(self.autoincrement_suffix());
                    }
                    pk = None;
                }
            }
        }
        if let Some(p) = pk {
            sql.push_str(&format!(
                ",\n  CONSTRAINT {} PRIMARY KEY ({})",
                quote(&p.name)?,
                quote_list(&p.column_names)?
            ));
        }
        for unique in table.unique_constraints() {
            sql.push_str(&format!(
                ",\n  CONSTRAINT {} UNIQUE ({})",
                quote(&unique.name)?,
                quote_list(&unique.column_names)?
            ));
        }
        if include_foreign_keys {
            for foreign_key in table.foreign_keys() {
                sql.push_str(&format!(
                    ",\n  CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                    quote(&foreign_key.name)?,
                    quote_list(&foreign_key.column_names)?,
                    quote(&foreign_key.referenced_table_name)?,
                    quote_list(&foreign_key.referenced_column_names)?
                ));
            }
        }
        sql.push_str("\n)");
        Ok(sql)
    }

    /// Create every table and index of `schema`, in one transaction.
    async fn create_schema(&self, schema: &SchemaInfo) -> Result<()>;

    /// Create a single table together with its normal-kind indexes.
    async fn create_table(&self, table: &TableInfo) -> Result<()>;

    /// Create one Normal-kind index of `table`.
    async fn create_index(&self, table: &TableInfo, index: &IndexInfo) -> Result<()>;

    /// Rename a table using this dialect's native syntax.
    async fn rename_table(&self, table: &TableInfo, new_name: &str) -> Result<()>;

    /// Drop a table.
    async fn delete_table(&self, table: &TableInfo) -> Result<()>;

    /// Apply a list of declarative transforms to one table of `schema` by
    /// rebuilding it.
    ///
    /// All validation happens before any SQL is emitted: the table must
    /// belong to `schema`, every transform must resolve against the evolving
    /// structure, and the result must not contain duplicate column names.
    /// An empty transform list is a no-op.
    async fn transform_table(
        &self,
        schema: &SchemaInfo,
        table_name: &str,
        transforms: &[TableTransform],
    ) -> Result<()> {
        if transforms.is_empty() {
            return Ok(());
        }
        let table = schema.table(table_name)?;
        let plan = RebuildPlan::new(table, transforms)?;
        self.rebuild_table(schema, table, &plan).await
    }

    /// Dialect-specific rebuild: create the shadow table, copy the data
    /// through the plan's source expressions, swap the table in, and restore
    /// constraints, all inside one transaction.
    async fn rebuild_table(
        &self,
        schema: &SchemaInfo,
        table: &TableInfo,
        plan: &RebuildPlan,
    ) -> Result<()>;
}

/// The type renderings shared by every dialect. Dialects handle the
/// text/binary/integer families themselves and delegate the rest here.
pub(crate) fn base_type_to_sql(ty: &TypeInfo) -> Result<String> {
    let nullable = if ty.nullable { "" } else { " NOT NULL" };
    let rendered = match ty.basic_type {
        BasicType::Boolean => "BIT",
        BasicType::Byte => "TINYINT",
        BasicType::Short => "SMALLINT",
        BasicType::Int => "INT",
        BasicType::Double => "FLOAT",
        BasicType::DateTime => "DATETIME",
        other => {
            return Err(SchemaError::Internal(format!(
                "BasicType {:?} must be rendered by the dialect",
                other
            )))
        }
    };
    Ok(format!("{}{}", rendered, nullable))
}

/// Pick a table name not present in `schema` for the rebuild shadow table:
/// `_new_table`, then `_new_table_2`, `_new_table_3`, ...
pub(crate) fn temporary_table_name(schema: &SchemaInfo) -> String {
    let mut name = "_new_table".to_string();
    let mut i = 1;
    while schema
        .tables()
        .iter()
        .any(|t| t.name.eq_ignore_ascii_case(&name))
    {
        i += 1;
        name = format!("_new_table_{}", i);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_log_collects_in_order() {
        let log = StatementLog::new();
        log.push("CREATE TABLE [a] (x INT)");
        log.push("DROP TABLE [a]");
        assert_eq!(
            log.statements(),
            vec!["CREATE TABLE [a] (x INT)", "DROP TABLE [a]"]
        );
        assert_eq!(log.take().len(), 2);
        assert!(log.statements().is_empty());
    }

    #[test]
    fn test_base_type_to_sql() {
        let ty = TypeInfo::new(BasicType::Boolean, false);
        assert_eq!(base_type_to_sql(&ty).unwrap(), "BIT NOT NULL");
        let ty = TypeInfo::new(BasicType::DateTime, true);
        assert_eq!(base_type_to_sql(&ty).unwrap(), "DATETIME");
        assert!(base_type_to_sql(&TypeInfo::new(BasicType::VarText, true)).is_err());
    }

    #[test]
    fn test_temporary_table_name_probes_until_free() {
        let mut schema = SchemaInfo::new();
        assert_eq!(temporary_table_name(&schema), "_new_table");

        let mut t = TableInfo::new("_new_table");
        t.add_column(ColumnInfo::new(
            "x",
            TypeInfo::new(BasicType::Int, false),
        ))
        .unwrap();
        schema.add_table(t).unwrap();
        assert_eq!(temporary_table_name(&schema), "_new_table_2");

        let mut t2 = TableInfo::new("_NEW_TABLE_2");
        t2.add_column(ColumnInfo::new(
            "x",
            TypeInfo::new(BasicType::Int, false),
        ))
        .unwrap();
        schema.add_table(t2).unwrap();
        assert_eq!(temporary_table_name(&schema), "_new_table_3");
    }
}
