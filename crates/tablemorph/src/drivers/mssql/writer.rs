//! SQL Server schema writer.
//!
//! Foreign keys are never created inline: `create_schema` creates every
//! table first and adds the constraints in a second pass, so table ordering
//! never produces a forward reference. `transform_table` rebuilds the table
//! and must drop every foreign key pointing at it first — SQL Server refuses
//! to drop a referenced table — and re-add them by name after the rename.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::identifier::{quote, quote_list, string_literal};
use crate::core::schema::{ForeignKeyInfo, IndexInfo, SchemaInfo, TableInfo};
use crate::core::traits::{
    base_type_to_sql, temporary_table_name, SchemaWriter, SqlExecutor, StatementLog,
};
use crate::core::transform::RebuildPlan;
use crate::core::types::{BasicType, DbEngine, IndexKind, TypeInfo};
use crate::error::{Result, SchemaError};

/// Writes schema changes to a SQL Server database.
pub struct MssqlWriter {
    executor: Option<Arc<dyn SqlExecutor>>,
    log: Option<StatementLog>,
}

impl MssqlWriter {
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

    async fn add_foreign_key(&self, table_name: &str, foreign_key: &ForeignKeyInfo) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quote(table_name)?,
            quote(&foreign_key.name)?,
            quote_list(&foreign_key.column_names)?,
            quote(&foreign_key.referenced_table_name)?,
            quote_list(&foreign_key.referenced_column_names)?
        );
        self.execute_sql(&sql).await?;
        Ok(())
    }

    async fn drop_constraint(&self, table_name: &str, constraint_name: &str) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            quote(table_name)?,
            quote(constraint_name)?
        );
        self.execute_sql(&sql).await?;
        Ok(())
    }

    /// The foreign keys on other tables of `schema` that reference `table`.
    fn inbound_foreign_keys<'a>(
        schema: &'a SchemaInfo,
        table: &TableInfo,
    ) -> Vec<(&'a TableInfo, &'a ForeignKeyInfo)> {
        schema
            .tables()
            .iter()
            .filter(|t| !t.name.eq_ignore_ascii_case(&table.name))
            .flat_map(|t| {
                t.foreign_keys()
                    .iter()
                    .filter(|fk| {
                        fk.referenced_table_name
                            .eq_ignore_ascii_case(&table.name)
                    })
                    .map(move |fk| (t, fk))
            })
            .collect()
    }
}

#[async_trait]
impl SchemaWriter for MssqlWriter {
    fn engine(&self) -> DbEngine {
        DbEngine::SqlServer
    }

    fn executor(&self) -> Option<&dyn SqlExecutor> {
        self.executor.as_deref()
    }

    fn log(&self) -> Option<&StatementLog> {
        self.log.as_ref()
    }

    fn type_to_sql(&self, ty: &TypeInfo) -> Result<String> {
        let nullable = if ty.nullable { "" } else { " NOT NULL" };
        let length = match ty.length {
            Some(l) => format!("({})", l),
            None => "(MAX)".to_string(),
        };
        match ty.basic_type {
            BasicType::VarText => Ok(format!("NVARCHAR{}{}", length, nullable)),
            BasicType::VarBinary => Ok(format!("VARBINARY{}{}", length, nullable)),
            BasicType::Autoincrement | BasicType::Long => Ok(format!("BIGINT{}", nullable)),
            _ => base_type_to_sql(ty),
        }
    }

    fn autoincrement_suffix(&self) -> &'static str {
        "IDENTITY(1,1)"
    }

    fn sql_length(&self, expr: &str) -> String {
        format!("len({})", expr)
    }

    async fn create_schema(&self, schema: &SchemaInfo) -> Result<()> {
        self.execute_sql("BEGIN TRANSACTION").await?;
        // Tables first, without foreign keys, so creation order never
        // produces a forward reference.
        for table in schema.tables() {
            let sql = self.create_table_sql(table, false)?;
            self.execute_sql(&sql).await?;
        }
        for (table, foreign_key) in schema.foreign_keys() {
            self.add_foreign_key(&table.name, foreign_key).await?;
        }
        for (table, index) in schema.indexes() {
            if index.kind == IndexKind::Normal {
                self.create_index(table, index).await?;
            }
        }
        self.execute_sql("COMMIT TRANSACTION").await?;
        Ok(())
    }

    async fn create_table(&self, table: &TableInfo) -> Result<()> {
        self.execute_sql("BEGIN TRANSACTION").await?;
        let sql = self.create_table_sql(table, true)?;
        self.execute_sql(&sql).await?;
        for index in table.indexes().iter().filter(|i| i.kind == IndexKind::Normal) {
            self.create_index(table, index).await?;
        }
        self.execute_sql("COMMIT TRANSACTION").await?;
        Ok(())
    }

    async fn create_index(&self, table: &TableInfo, index: &IndexInfo) -> Result<()> {
        if index.kind != IndexKind::Normal {
            return Err(SchemaError::Internal(
                "create_index requires the index kind to be Normal".to_string(),
            ));
        }
        let sql = format!(
            "CREATE INDEX {} ON {} ({})",
            quote(&index.name)?,
            quote(&table.name)?,
            quote_list(&index.column_names)?
        );
        self.execute_sql(&sql).await?;
        Ok(())
    }

    async fn rename_table(&self, table: &TableInfo, new_name: &str) -> Result<()> {
        let sql = format!(
            "sp_rename @objname={}, @newname={}, @objtype='OBJECT'",
            string_literal(&table.name),
            string_literal(new_name)
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
        let inbound = Self::inbound_foreign_keys(schema, table);

        self.execute_sql("BEGIN TRANSACTION").await?;

        // Drop every foreign-key constraint involving this table so it can
        // be dropped and rebuilt.
        for foreign_key in table.foreign_keys() {
            self.drop_constraint(&table.name, &foreign_key.name).await?;
        }
        for (other_table, foreign_key) in &inbound {
            self.drop_constraint(&other_table.name, &foreign_key.name)
                .await?;
        }

        // The shadow table carries columns only; the primary key is restored
        // by name after the rename.
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
            if entry.column.ty.basic_type == BasicType::Autoincrement {
                sql.push(' ');
                sql.push_str(self.autoincrement_suffix());
            }
        }
        sql.push_str("\n)");
        self.execute_sql(&sql).await?;

        // Identity columns reject explicit inserts unless the toggle is on;
        // the toggle itself errors on tables without an identity column.
        let toggle_identity = plan.has_autoincrement();
        if toggle_identity {
            self.execute_sql(&format!(
                "SET IDENTITY_INSERT {} ON",
                quote(&new_table_name)?
            ))
            .await?;
        }

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

        if toggle_identity {
            self.execute_sql(&format!(
                "SET IDENTITY_INSERT {} OFF",
                quote(&new_table_name)?
            ))
            .await?;
        }

        self.execute_sql(&format!("DROP TABLE {}", quote(&table.name)?))
            .await?;

        self.execute_sql(&format!(
            "sp_rename @objname={}, @newname={}, @objtype='OBJECT'",
            string_literal(&new_table_name),
            string_literal(&table.name)
        ))
        .await?;

        // Re-create the primary key on the renamed table.
        if let Some(pk) = table.primary_key() {
            self.execute_sql(&format!(
                "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
                quote(&table.name)?,
                quote(&pk.name)?,
                quote_list(&pk.column_names)?
            ))
            .await?;
        }

        // Put every dropped foreign-key constraint back.
        for foreign_key in table.foreign_keys() {
            self.add_foreign_key(&table.name, foreign_key).await?;
        }
        for (other_table, foreign_key) in &inbound {
            self.add_foreign_key(&other_table.name, foreign_key).await?;
        }

        self.execute_sql("COMMIT TRANSACTION").await?;
        Ok(())
    }
}
