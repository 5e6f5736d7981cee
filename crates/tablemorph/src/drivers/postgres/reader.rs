//! PostgreSQL schema reader (partial backend).
//!
//! Table and column retrieval work against `information_schema`; index and
//! foreign-key retrieval are not implemented yet and report `NotSupported`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::identifier::string_literal;
use crate::core::schema::{ColumnInfo, ForeignKeyInfo, IndexInfo, TableInfo};
use crate::core::traits::{SchemaReader, SqlExecutor};
use crate::core::types::{BasicType, DbEngine, TypeInfo};
use crate::error::{Result, SchemaError};

/// Reads the schema of a PostgreSQL database (columns only for now).
pub struct PostgresReader {
    executor: Arc<dyn SqlExecutor>,
}

impl PostgresReader {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl SchemaReader for PostgresReader {
    fn engine(&self) -> DbEngine {
        DbEngine::Postgres
    }

    async fn retrieve_tables(&self) -> Result<Vec<TableInfo>> {
        let rows = self
            .executor
            .query(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
                 ORDER BY table_name",
            )
            .await?;
        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            tables.push(self.retrieve_table(row.get_str("table_name")?).await?);
        }
        Ok(tables)
    }

    async fn retrieve_columns(&self, table_name: &str) -> Result<Vec<ColumnInfo>> {
        let sql = format!(
            "SELECT column_name, is_nullable, character_maximum_length, column_default, data_type \
             FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = {} \
             ORDER BY ordinal_position",
            string_literal(table_name)
        );
        let rows = self.executor.query(&sql).await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row.get_str("column_name")?.to_string();
            let nullable = row.get_str("is_nullable")?.eq_ignore_ascii_case("yes");
            let char_max_length = row.get_opt_i64("character_maximum_length")?;
            let default = row.get_opt_str("column_default")?.unwrap_or("");
            let data_type = row.get_str("data_type")?;
            let ty = native_type_to_type_info(data_type, char_max_length, nullable, default)?;
            ty.validate()?;
            let column = ColumnInfo::new(name, ty);
            column.validate()?;
            columns.push(column);
        }
        Ok(columns)
    }

    async fn retrieve_indexes(&self, _table_name: &str) -> Result<Vec<IndexInfo>> {
        Err(SchemaError::NotSupported(
            "Index retrieval is not implemented for the Postgres backend".to_string(),
        ))
    }

    async fn retrieve_foreign_keys(&self, _table_name: &str) -> Result<Vec<ForeignKeyInfo>> {
        Err(SchemaError::NotSupported(
            "Foreign-key retrieval is not implemented for the Postgres backend".to_string(),
        ))
    }
}

/// Map a native PostgreSQL type to the portable model.
fn native_type_to_type_info(
    data_type: &str,
    char_max_length: Option<i64>,
    nullable: bool,
    column_default: &str,
) -> Result<TypeInfo> {
    let sql_type = data_type.to_ascii_lowercase();
    let default = column_default.to_ascii_lowercase();
    let autoincrement = default.starts_with("nextval(") && default.ends_with("::regclass)");

    if autoincrement {
        return if sql_type == "bigint" {
            Ok(TypeInfo::new(BasicType::Autoincrement, nullable))
        } else {
            Err(SchemaError::NotSupported(format!(
                "SQL type \"{}\" cannot be autoincrement",
                sql_type
            )))
        };
    }

    let length = match char_max_length {
        Some(l) if l >= 0 => u32::try_from(l).ok(),
        _ => None,
    };

    match sql_type.as_str() {
        "text" | "character varying" => Ok(TypeInfo {
            basic_type: BasicType::VarText,
            nullable,
            length,
        }),
        "bytea" => Ok(TypeInfo {
            basic_type: BasicType::VarBinary,
            nullable,
            length,
        }),
        "character" | "bit" => Err(SchemaError::NotSupported(format!(
            "Fixed-width types are not supported, in particular \"{}\"",
            sql_type
        ))),
        "boolean" => Ok(TypeInfo::new(BasicType::Boolean, nullable)),
        "smallint" => Ok(TypeInfo::new(BasicType::Short, nullable)),
        "integer" => Ok(TypeInfo::new(BasicType::Int, nullable)),
        "bigint" => Ok(TypeInfo::new(BasicType::Long, nullable)),
        "double precision" => Ok(TypeInfo::new(BasicType::Double, nullable)),
        "timestamp with time zone" => Ok(TypeInfo::new(BasicType::DateTime, nullable)),
        other => Err(SchemaError::NotSupported(format!(
            "Don't know how to convert SQL type \"{}\"",
            other
        ))),
    }
}
