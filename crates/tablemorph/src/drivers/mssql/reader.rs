//! SQL Server schema reader.
//!
//! Reconstructs the schema graph from `sys.*` catalog views and
//! `information_schema`. Identity columns map to the Autoincrement type
//! (bigint only); fixed-width char/binary types are rejected.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::identifier::string_literal;
use crate::core::schema::{ColumnInfo, ForeignKeyInfo, IndexInfo, TableInfo};
use crate::core::traits::{SchemaReader, SqlExecutor};
use crate::core::types::{BasicType, DbEngine, IndexKind, TypeInfo};
use crate::error::{Result, SchemaError};

/// Reads the schema of a SQL Server database.
pub struct MssqlReader {
    executor: Arc<dyn SqlExecutor>,
}

impl MssqlReader {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl SchemaReader for MssqlReader {
    fn engine(&self) -> DbEngine {
        DbEngine::SqlServer
    }

    async fn retrieve_tables(&self) -> Result<Vec<TableInfo>> {
        let rows = self
            .executor
            .query(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_type = 'BASE TABLE' ORDER BY table_name",
            )
            .await?;
        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            tables.push(self.retrieve_table(row.get_str("table_name")?).await?);
        }
        debug!("retrieved {} table(s) from sql server catalog", tables.len());
        Ok(tables)
    }

    async fn retrieve_columns(&self, table_name: &str) -> Result<Vec<ColumnInfo>> {
        let sql = format!(
            "SELECT
                sc.name AS ColumnName,
                sc.is_nullable AS IsNullable,
                sc.is_identity AS IsAutoincrement,
                ic.ordinal_position AS OrdinalPosition,
                ic.data_type AS DataType,
                ic.character_maximum_length AS CharMaxLength
            FROM
                sys.columns sc
                JOIN sys.tables t ON t.object_id = sc.object_id
                JOIN information_schema.columns ic
                    ON ic.table_name = t.name AND ic.column_name = sc.name
            WHERE
                t.type = 'U'
                AND t.name = {}
            ORDER BY
                OrdinalPosition",
            string_literal(table_name)
        );

        let rows = self.executor.query(&sql).await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row.get_str("ColumnName")?.to_string();
            let nullable = row.get_bool("IsNullable")?;
            let autoincrement = row.get_bool("IsAutoincrement")?;
            let data_type = row.get_str("DataType")?;
            let char_max_length = row.get_opt_i64("CharMaxLength")?;
            let ty = native_type_to_type_info(data_type, char_max_length, nullable, autoincrement)?;
            ty.validate()?;
            let column = ColumnInfo::new(name, ty);
            column.validate()?;
            columns.push(column);
        }
        Ok(columns)
    }

    async fn retrieve_indexes(&self, table_name: &str) -> Result<Vec<IndexInfo>> {
        let sql = format!(
            "SELECT
                i.name AS IndexName,
                t.name AS TableName,
                (SELECT c.name FROM sys.columns c
                 WHERE c.object_id = ic.object_id AND c.column_id = ic.column_id) AS ColumnName,
                i.is_primary_key AS IsPrimaryKey,
                i.is_unique_constraint AS IsUniqueConstraint
            FROM
                sys.index_columns ic
                JOIN sys.indexes i ON ic.object_id = i.object_id AND ic.index_id = i.index_id
                JOIN sys.tables t ON ic.object_id = t.object_id
            WHERE
                t.type = 'U'
                AND t.name = {}
            ORDER BY
                IndexName, ic.key_ordinal",
            string_literal(table_name)
        );

        let rows = self.executor.query(&sql).await?;
        let mut indexes: Vec<IndexInfo> = Vec::new();
        for row in rows {
            let index_name = row.get_str("IndexName")?.to_string();
            let column_name = row.get_str("ColumnName")?.to_string();
            match indexes
                .iter_mut()
                .find(|i| i.name.eq_ignore_ascii_case(&index_name))
            {
                Some(index) => index.column_names.push(column_name),
                None => {
                    let kind = if row.get_bool("IsPrimaryKey")? {
                        IndexKind::PrimaryKey
                    } else if row.get_bool("IsUniqueConstraint")? {
                        IndexKind::Unique
                    } else {
                        IndexKind::Normal
                    };
                    indexes.push(IndexInfo::new(index_name, kind, vec![column_name]));
                }
            }
        }
        for index in &indexes {
            index.validate()?;
        }
        Ok(indexes)
    }

    async fn retrieve_foreign_keys(&self, table_name: &str) -> Result<Vec<ForeignKeyInfo>> {
        let sql = format!(
            "SELECT * FROM (
                SELECT
                    OBJECT_NAME(fkc.constraint_object_id) AS ForeignKeyName,
                    OBJECT_NAME(fkc.parent_object_id) AS ParentTable,
                    OBJECT_NAME(fkc.referenced_object_id) AS ReferencedTable,
                    (SELECT cp.name FROM sys.columns cp
                     WHERE cp.object_id = fkc.parent_object_id
                       AND cp.column_id = fkc.parent_column_id) AS ParentColumnName,
                    (SELECT cp.name FROM sys.columns cp
                     WHERE cp.object_id = fkc.referenced_object_id
                       AND cp.column_id = fkc.referenced_column_id) AS ReferencedColumnName
                FROM
                    sys.foreign_key_columns fkc
            ) subquery
            WHERE ParentTable = {}
            ORDER BY ForeignKeyName",
            string_literal(table_name)
        );

        let rows = self.executor.query(&sql).await?;
        let mut foreign_keys: Vec<ForeignKeyInfo> = Vec::new();
        for row in rows {
            let name = row.get_str("ForeignKeyName")?.to_string();
            let parent_column = row.get_str("ParentColumnName")?.to_string();
            let referenced_column = row.get_str("ReferencedColumnName")?.to_string();
            match foreign_keys
                .iter_mut()
                .find(|fk| fk.name.eq_ignore_ascii_case(&name))
            {
                Some(foreign_key) => {
                    foreign_key.column_names.push(parent_column);
                    foreign_key.referenced_column_names.push(referenced_column);
                }
                None => {
                    let referenced_table = row.get_str("ReferencedTable")?.to_string();
                    foreign_keys.push(ForeignKeyInfo::new(
                        name,
                        vec![parent_column],
                        referenced_table,
                        vec![referenced_column],
                    ));
                }
            }
        }
        for foreign_key in &foreign_keys {
            foreign_key.validate()?;
        }
        Ok(foreign_keys)
    }
}

/// Map a native SQL Server type to the portable model.
fn native_type_to_type_info(
    data_type: &str,
    char_max_length: Option<i64>,
    nullable: bool,
    autoincrement: bool,
) -> Result<TypeInfo> {
    let sql_type = data_type.to_ascii_lowercase();

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
        // The catalog reports -1 for NVARCHAR(MAX)/VARBINARY(MAX).
        Some(l) if l >= 0 => u32::try_from(l).ok(),
        _ => None,
    };

    match sql_type.as_str() {
        "varchar" | "nvarchar" => Ok(TypeInfo {
            basic_type: BasicType::VarText,
            nullable,
            length,
        }),
        "varbinary" => Ok(TypeInfo {
            basic_type: BasicType::VarBinary,
            nullable,
            length,
        }),
        "char" | "nchar" | "binary" => Err(SchemaError::NotSupported(format!(
            "Fixed-width types are not supported, in particular \"{}\"",
            sql_type
        ))),
        "bit" | "bool" | "boolean" => Ok(TypeInfo::new(BasicType::Boolean, nullable)),
        "tinyint" => Ok(TypeInfo::new(BasicType::Byte, nullable)),
        "smallint" => Ok(TypeInfo::new(BasicType::Short, nullable)),
        "int" => Ok(TypeInfo::new(BasicType::Int, nullable)),
        "bigint" => Ok(TypeInfo::new(BasicType::Long, nullable)),
        "float" => Ok(TypeInfo::new(BasicType::Double, nullable)),
        "datetime" => Ok(TypeInfo::new(BasicType::DateTime, nullable)),
        other => Err(SchemaError::NotSupported(format!(
            "Don't know how to convert SQL type \"{}\"",
            other
        ))),
    }
}
