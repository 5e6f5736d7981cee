//! SQLite schema writer.
//!
//! SQLite cannot alter, reorder or drop columns in place, so
//! `transform_table` rebuilds the table: create a shadow table with the new
//! structure, copy the rows across, drop the original and rename the shadow
//! into place. SQLite permits dropping a table that inbound foreign keys
//! still reference, and the final rename re-points those references at the
//! new table object, so no constraint juggling is needed.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::identifier::{quote, quote_list};
use crate::core::schema::{IndexInfo, SchemaInfo, TableInfo};
use crate::core::traits::{
    base_type_to_sql, temporary_table_name, SchemaWriter, SqlExecutor, StatementLog,
};
use crate::core::transform::RebuildPlan;
use crate::core::types::{BasicType, DbEngine, IndexKind, TypeInfo};
use crate::error::{Result, SchemaError};

/// Writes schema changes to a SQLite database.
pub struct SqliteWriter {
    executor: Option<Arc<dyn SqlExecutor>>,
    log: Option<StatementLog>,
}

impl SqliteWriter {
    /// Create a writer. Pass `None` to produce DDL without touching any
    /// database (log-only mode).
    pub fn new(executor: Option<Arc<dyn SqlExecutor>>) -> Self {
        Self {
            executor,
            log: None,
        }
    }

    /// Attach a statement sink collecting every emitted statement.
    pub fn with_log(mut self, log: StatementLog) -> Self {
        self.log = Some(log);
        self
    }

    async fn create_table_impl(&self, table: &TableInfo, own_transaction: bool) -> Result<()> {
        if own_transaction {
            self.execute_sql("BEGIN TRANSACTION").await?;
        }
        let sql = self.create_table_sql(table, true)?;
        self.execute_sql(&sql).await?;
        for index in table.indexes().iter().filter(|i| i.kind == IndexKind::Normal) {
            self.create_index(table, index).await?;
        }
        if own_transaction {
            self.execute_sql("COMMIT TRANSACTION").await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SchemaWriter for SqliteWriter {
    fn engine(&self) -> DbEngine {
        DbEngine::Sqlite
    }

    fn executor(&self) -> Option<&dyn SqlExecutor> {
        self.executor.as_deref()
    }

    fn log(&self) -> Option<&StatementLog> {
        self.log.as_ref()
    }

    fn type_to_sql(&self, ty: &TypeInfo) -> Result<String> {
        let nullable = if ty.nullable { "" } else { " NOT NULL" };
        let length = ty.length.map(|l| format!("({})", l)).unwrap_or_default();
        match ty.basic_type {
            BasicType::VarText => Ok(format!("NVARCHAR{}{} COLLATE NOCASE", length, nullable)),
            BasicType::VarBinary => Ok(format!("VARBINARY{}{}", length, nullable)),
            BasicType::Autoincrement | BasicType::Long => Ok(format!("INTEGER{}", nullable)),
            _ => base_type_to_sql(ty),
        }
    }

    fn autoincrement_suffix(&self) -> &'static str {
        "AUTOINCREMENT"
    }

    fn sql_length(&self, expr: &str) -> String {
        format!("length({})", expr)
    }

    async fn create_schema(&self, schema: &SchemaInfo) -> Result<()> {
        self.execute_sql("BEGIN TRANSACTION").await?;
        for table in schema.tables() {
            self.create_table_impl(table, false).await?;
        }
        self.execute_sql("COMMIT TRANSACTION").await?;
        Ok(())
    }

    async fn create_table(&self, table: &TableInfo) -> Result<()> {
        self.create_table_impl(table, true).await
    }

    async fn create_index(&self, table: &TableInfo, index: &IndexInfo) -> Result<()> {
        if index.kind != IndexKind::Normal {
            return Err(SchemaError::Internal(
                "create_index requires the index kind to be Normal".to_string(),
            ));
        }
        let mut columns = Vec::with_capacity(index.column_names.len());
        for column_name in &index.column_names {
            let column = table.column(column_name)?;
            // Text columns are collated case-insensitively, matching the
            // column definitions.
            if column.ty.basic_type == BasicType::VarText {
                columns.push(format!("{} COLLATE NOCASE", quote(column_name)?));
            } else {
                columns.push(quote(column_name)?);
            }
        }
        let sql = format!(
            "CREATE INDEX {} ON {} ({})",
            quote(&index.name)?,
            quote(&table.name)?,
            columns.join(", ")
        );
        self.execute_sql(&sql).await?;
        Ok(())
    }

    async fn rename_table(&self, table: &TableInfo, new_name: &str) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} RENAME TO {}",
            quote(&table.name)?,
            quote(new_name)?
        );
        self.execute_sql(&sql).await?;
        Ok(())
    }

    async fn delete_table(&self, table: &TableInfo) -> Result<()> {
        let sql = format!("DROP TABLE {}", quote(&table.name)?);
        self.execute_sql(&sql).await?;
        Ok(())
    }

    async fn rebuild_table(
        &self,
        schema: &SchemaInfo,
        table: &TableInfo,
        plan: &RebuildPlan,
    ) -> Result<()> {
        let new_table_name = temporary_table_name(schema);

        self.execute_sql("BEGIN TRANSACTION").await?;

        let pk_names = plan.pk_column_names(table);
        let mut pending_pk = table
            .primary_key()
            .filter(|_| !pk_names.is_empty())
            .map(|pk| (pk.name.clone(), pk_names));

        let mut sql = format!("CREATE TABLE {} (\n", quote(&new_table_name)?);
        let mut first = true;
        for entry in plan.columns() {
            if !first {
                sql.push_str(",\n");
            }
            first = false;
            sql.push_str(&format!(
                "    {} {}",
                quote(&entry.column.name)?,
                self.type_to_sql(&entry.column.ty)?
            ));
            // Inline the primary key when it is single-column.
            let single_pk_here = matches!(
                &pending_pk,
                Some((_, columns))
                    if columns.len() == 1
                        && columns[0].eq_ignore_ascii_case(&entry.column.name)
            );
            if single_pk_here {
                if let Some((pk_name, _)) = pending_pk.take() {
                    sql.push_str(&format!(" CONSTRAINT {} PRIMARY KEY", quote(&pk_name)?));
                    if entry.column.ty.basic_type == BasicType::Autoincrement {
                        sql.push(' ');
                        sql.push_str(self.autoincrement_suffix());
                    }
                }
            }
        }
        if let Some((pk_name, columns)) = &pending_pk {
            sql.push_str(&format!(
                ",\n  CONSTRAINT {} PRIMARY KEY ({})",
                quote(pk_name)?,
                quote_list(columns)?
            ));
        }
        // Carry over the foreign-key constraints of the old table.
        for foreign_key in table.foreign_keys() {
            sql.push_str(&format!(
                ",\n    CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                quote(&foreign_key.name)?,
                quote_list(&foreign_key.column_names)?,
                quote(&foreign_key.referenced_table_name)?,
                quote_list(&foreign_key.referenced_column_names)?
            ));
        }
        sql.push_str("\n)");
        self.execute_sql(&sql).await?;

        let names: Vec<&str> = plan
            .columns()
            .iter()
            .map(|c| c.column.name.as_str())
            .collect();
        let sources: Vec<&str> = plan.columns().iter().map(|c| c.source.as_str()).collect();
        let copy = format!(
            "INSERT INTO {} ({})\nSELECT {}\nFROM {} oldtable",
            quote(&new_table_name)?,
            quote_list(&names)?,
            sources.join(", "),
            quote(&table.name)?
        );
        self.execute_sql(&copy).await?;

        // SQLite allows dropping the table even while foreign-key
        // constraints point at it.
        self.execute_sql(&format!("DROP TABLE {}", quote(&table.name)?))
            .await?;

        // Renaming the new table to the old name makes those constraints
        // point at it automatically.
        self.execute_sql(&format!(
            "ALTER TABLE {} RENAME TO {}",
            quote(&new_table_name)?,
            quote(&table.name)?
        ))
        .await?;

        self.execute_sql("COMMIT TRANSACTION").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::ColumnInfo;

    fn writer_with_log() -> (SqliteWriter, StatementLog) {
        let log = StatementLog::new();
        let writer = SqliteWriter::new(None).with_log(log.clone());
        (writer, log)
    }

    fn users_table() -> TableInfo {
        let mut table = TableInfo::new("Users");
        table
            .add_column(ColumnInfo::new(
                "Id",
                TypeInfo::new(BasicType::Autoincrement, false),
            ))
            .unwrap();
        table
            .add_column(ColumnInfo::new(
                "Name",
                TypeInfo::with_length(BasicType::VarText, false, 100),
            ))
            .unwrap();
        table
            .add_index(IndexInfo::new("pk_Users", IndexKind::PrimaryKey, vec!["Id"]))
            .unwrap();
        table
            .add_index(IndexInfo::new("ix_Users_Name", IndexKind::Normal, vec!["Name"]))
            .unwrap();
        table
    }

    #[test]
    fn test_type_rendering() {
        let writer = SqliteWriter::new(None);
        assert_eq!(
            writer
                .type_to_sql(&TypeInfo::with_length(BasicType::VarText, false, 100))
                .unwrap(),
            "NVARCHAR(100) NOT NULL COLLATE NOCASE"
        );
        assert_eq!(
            writer
                .type_to_sql(&TypeInfo::new(BasicType::VarText, true))
                .unwrap(),
            "NVARCHAR COLLATE NOCASE"
        );
        assert_eq!(
            writer
                .type_to_sql(&TypeInfo::new(BasicType::Autoincrement, false))
                .unwrap(),
            "INTEGER NOT NULL"
        );
        assert_eq!(
            writer
                .type_to_sql(&TypeInfo::with_length(BasicType::VarBinary, true, 16))
                .unwrap(),
            "VARBINARY(16)"
        );
        assert_eq!(
            writer
                .type_to_sql(&TypeInfo::new(BasicType::Boolean, false))
                .unwrap(),
            "BIT NOT NULL"
        );
    }

    #[test]
    fn test_sql_length() {
        let writer = SqliteWriter::new(None);
        assert_eq!(writer.sql_length("oldtable.[x]"), "length(oldtable.[x])");
    }

    #[tokio::test]
    async fn test_create_table_emits_inline_pk_and_index() {
        let (writer, log) = writer_with_log();
        writer.create_table(&users_table()).await.unwrap();
        let statements = log.statements();
        assert_eq!(statements[0], "BEGIN TRANSACTION");
        assert!(statements[1].starts_with("CREATE TABLE [Users] ("));
        assert!(statements[1]
            .contains("[Id] INTEGER NOT NULL CONSTRAINT [pk_Users] PRIMARY KEY AUTOINCREMENT"));
        assert!(statements[1].contains("[Name] NVARCHAR(100) NOT NULL COLLATE NOCASE"));
        assert_eq!(
            statements[2],
            "CREATE INDEX [ix_Users_Name] ON [Users] ([Name] COLLATE NOCASE)"
        );
        assert_eq!(statements[3], "COMMIT TRANSACTION");
    }

    #[tokio::test]
    async fn test_unbound_writer_returns_sentinel() {
        let (writer, _log) = writer_with_log();
        assert_eq!(writer.execute_sql("SELECT 1").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_create_index_rejects_non_normal() {
        let (writer, _log) = writer_with_log();
        let table = users_table();
        let pk = table.primary_key().unwrap().clone();
        assert!(writer.create_index(&table, &pk).await.is_err());
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let (writer, log) = writer_with_log();
        let table = users_table();
        writer.rename_table(&table, "People").await.unwrap();
        writer.delete_table(&table).await.unwrap();
        assert_eq!(
            log.statements(),
            vec![
                "ALTER TABLE [Users] RENAME TO [People]",
                "DROP TABLE [Users]"
            ]
        );
    }
}
