//! SQLite schema reader.
//!
//! Columns, indexes and foreign-key column pairs come from the pragmas
//! (`table_info`, `index_list`, `index_info`, `foreign_key_list`); declared
//! constraint names, foreign-key names and the `AUTOINCREMENT` flag come
//! from parsing the stored `CREATE TABLE` text (see [`super::ddl`]).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::identifier::{quote, string_literal};
use crate::core::schema::{ColumnInfo, ForeignKeyInfo, IndexInfo, TableInfo};
use crate::core::traits::{SchemaReader, SqlExecutor};
use crate::core::types::{BasicType, DbEngine, IndexKind, TypeInfo};
use crate::error::{Result, SchemaError};

use super::ddl::{parse_create_table, ParsedTableDdl};

/// SQLite's sentinel for "no declared length" on text columns.
const SQLITE_MAX_LENGTH: i64 = 2_147_483_647;

/// Reads the schema of a SQLite database.
pub struct SqliteReader {
    executor: Arc<dyn SqlExecutor>,
}

impl SqliteReader {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self { executor }
    }

    /// Fetch and parse the stored table definition.
    async fn parsed_ddl(&self, table_name: &str) -> Result<ParsedTableDdl> {
        let sql = format!(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = {}",
            string_literal(table_name)
        );
        let rows = self.executor.query(&sql).await?;
        let row = rows.first().ok_or_else(|| {
            SchemaError::NotFound(format!(
                "Table [{}] does not exist in this database",
                table_name
            ))
        })?;
        parse_create_table(table_name, row.get_str("sql")?)
    }
}

#[async_trait]
impl SchemaReader for SqliteReader {
    fn engine(&self) -> DbEngine {
        DbEngine::Sqlite
    }

    async fn retrieve_tables(&self) -> Result<Vec<TableInfo>> {
        let rows = self
            .executor
            .query(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .await?;
        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            tables.push(self.retrieve_table(row.get_str("name")?).await?);
        }
        debug!("retrieved {} table(s) from sqlite catalog", tables.len());
        Ok(tables)
    }

    async fn retrieve_columns(&self, table_name: &str) -> Result<Vec<ColumnInfo>> {
        let parsed = self.parsed_ddl(table_name).await?;
        let rows = self
            .executor
            .query(&format!("PRAGMA table_info({})", quote(table_name)?))
            .await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row.get_str("name")?.to_string();
            let declared = row.get_str("type")?;
            let nullable = !row.get_bool("notnull")?;
            let autoincrement = parsed
                .autoincrement_column
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(&name));
            let ty = declared_type_to_type_info(declared, nullable, autoincrement)?;
            ty.validate()?;
            let column = ColumnInfo::new(name, ty);
            column.validate()?;
            columns.push(column);
        }
        Ok(columns)
    }

    async fn retrieve_indexes(&self, table_name: &str) -> Result<Vec<IndexInfo>> {
        let parsed = self.parsed_ddl(table_name).await?;
        let rows = self
            .executor
            .query(&format!("PRAGMA index_list({})", quote(table_name)?))
            .await?;

        let mut indexes = Vec::new();
        for row in rows {
            let stored_name = row.get_str("name")?.to_string();
            let unique = row.get_bool("unique")?;
            let origin = row.get_str("origin")?.to_string();

            let mut column_rows: Vec<(i64, String)> = Vec::new();
            for info in self
                .executor
                .query(&format!("PRAGMA index_info({})", quote(&stored_name)?))
                .await?
            {
                column_rows.push((info.get_i64("seqno")?, info.get_str("name")?.to_string()));
            }
            column_rows.sort_by_key(|(seqno, _)| *seqno);
            let column_names: Vec<String> =
                column_rows.into_iter().map(|(_, name)| name).collect();

            let (name, kind) = match origin.as_str() {
                "pk" => {
                    if !unique {
                        return Err(SchemaError::Internal(format!(
                            "Index [{}] on table [{}] is marked as primary key but not unique",
                            stored_name, table_name
                        )));
                    }
                    let name = parsed
                        .primary_key
                        .as_ref()
                        .map(|pk| pk.name.clone())
                        .unwrap_or(stored_name);
                    (name, IndexKind::PrimaryKey)
                }
                "u" => {
                    // Unique constraints surface as sqlite_autoindex_* here;
                    // the declared constraint name lives in the stored DDL.
                    let name = parsed
                        .unique_constraints
                        .iter()
                        .find(|uc| name_lists_equal(&uc.columns, &column_names))
                        .map(|uc| uc.name.clone())
                        .unwrap_or(stored_name);
                    (name, IndexKind::Unique)
                }
                _ => {
                    let kind = if unique {
                        IndexKind::Unique
                    } else {
                        IndexKind::Normal
                    };
                    (stored_name, kind)
                }
            };

            let index = IndexInfo::new(name, kind, column_names);
            index.validate()?;
            indexes.push(index);
        }

        // An INTEGER PRIMARY KEY is a rowid alias and gets no index_list
        // entry; reconstruct it from the stored DDL.
        if !indexes.iter().any(|i| i.kind == IndexKind::PrimaryKey) {
            if let Some(pk) = &parsed.primary_key {
                let index =
                    IndexInfo::new(pk.name.clone(), IndexKind::PrimaryKey, pk.columns.clone());
                index.validate()?;
                indexes.push(index);
            }
        }

        indexes.sort_by(|a, b| a.name.to_ascii_lowercase().cmp(&b.name.to_ascii_lowercase()));
        Ok(indexes)
    }

    async fn retrieve_foreign_keys(&self, table_name: &str) -> Result<Vec<ForeignKeyInfo>> {
        let parsed = self.parsed_ddl(table_name).await?;
        let rows = self
            .executor
            .query(&format!("PRAGMA foreign_key_list({})", quote(table_name)?))
            .await?;

        // Group rows by constraint id; each row is one column pair.
        let mut groups: BTreeMap<i64, Vec<(i64, String, String, String)>> = BTreeMap::new();
        for row in rows {
            let id = row.get_i64("id")?;
            let seq = row.get_i64("seq")?;
            let referenced_table = row.get_str("table")?.to_string();
            let from = row.get_str("from")?.to_string();
            let to = row.get_opt_str("to")?.ok_or_else(|| {
                SchemaError::NotSupported(format!(
                    "Foreign key on table [{}] does not name its referenced columns explicitly",
                    table_name
                ))
            })?;
            groups
                .entry(id)
                .or_default()
                .push((seq, from, to.to_string(), referenced_table));
        }

        let mut foreign_keys = Vec::with_capacity(groups.len());
        for (id, mut group) in groups {
            group.sort_by_key(|(seq, _, _, _)| *seq);
            let referenced_table = group[0].3.clone();
            let column_names: Vec<String> = group.iter().map(|(_, from, _, _)| from.clone()).collect();
            let referenced_column_names: Vec<String> =
                group.iter().map(|(_, _, to, _)| to.clone()).collect();

            let name = parsed
                .foreign_keys
                .iter()
                .find(|fk| {
                    fk.referenced_table.eq_ignore_ascii_case(&referenced_table)
                        && name_lists_equal(&fk.columns, &column_names)
                        && name_lists_equal(&fk.referenced_columns, &referenced_column_names)
                })
                .map(|fk| fk.name.clone())
                .unwrap_or_else(|| format!("fk_{}_{}", table_name, id));

            let foreign_key = ForeignKeyInfo::new(
                name,
                column_names,
                referenced_table,
                referenced_column_names,
            );
            foreign_key.validate()?;
            foreign_keys.push(foreign_key);
        }

        foreign_keys
            .sort_by(|a, b| a.name.to_ascii_lowercase().cmp(&b.name.to_ascii_lowercase()));
        Ok(foreign_keys)
    }
}

fn name_lists_equal(a: &[String], b: &[String]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.eq_ignore_ascii_case(y))
}

/// Map a declared SQLite column type to the portable model.
fn declared_type_to_type_info(
    declared: &str,
    nullable: bool,
    autoincrement: bool,
) -> Result<TypeInfo> {
    let trimmed = declared.trim();
    let (base, length) = match trimmed.find('(') {
        Some(open) => {
            let close = trimmed.rfind(')').ok_or_else(|| {
                SchemaError::NotSupported(format!(
                    "Malformed declared SQL type \"{}\"",
                    declared
                ))
            })?;
            let digits = trimmed[open + 1..close].trim();
            let length: i64 = digits.parse().map_err(|_| {
                SchemaError::NotSupported(format!(
                    "Malformed length in declared SQL type \"{}\"",
                    declared
                ))
            })?;
            (trimmed[..open].trim().to_ascii_lowercase(), Some(length))
        }
        None => (trimmed.to_ascii_lowercase(), None),
    };
    // Multi-word declarations ("DOUBLE PRECISION") match on the first word.
    let base = base.split_whitespace().next().unwrap_or("").to_string();

    if autoincrement {
        return if base == "integer" {
            // 64-bit in SQLite terms.
            Ok(TypeInfo::new(BasicType::Autoincrement, nullable))
        } else {
            Err(SchemaError::NotSupported(format!(
                "SQLite type \"{}\" cannot be autoincrement",
                base
            )))
        };
    }

    let no_length = |basic_type: BasicType| -> Result<TypeInfo> {
        if length.is_some() {
            return Err(SchemaError::NotSupported(format!(
                "SQL type \"{}\" with a length specified",
                base
            )));
        }
        Ok(TypeInfo::new(basic_type, nullable))
    };

    match base.as_str() {
        "" | "varchar" | "nvarchar" | "text" => Ok(TypeInfo {
            basic_type: BasicType::VarText,
            nullable,
            length: normalize_length(length),
        }),
        "varbinary" | "blob" => Ok(TypeInfo {
            basic_type: BasicType::VarBinary,
            nullable,
            length: normalize_length(length),
        }),
        "char" | "nchar" | "binary" => Err(SchemaError::NotSupported(format!(
            "Fixed-width types are not supported, in particular \"{}\"",
            base
        ))),
        "bit" | "bool" | "boolean" => no_length(BasicType::Boolean),
        "tinyint" => no_length(BasicType::Byte),
        "smallint" => no_length(BasicType::Short),
        "int" => no_length(BasicType::Int),
        "bigint" | "integer" | "long" => no_length(BasicType::Long),
        "float" | "double" | "real" => no_length(BasicType::Double),
        "datetime" => no_length(BasicType::DateTime),
        other => Err(SchemaError::NotSupported(format!(
            "Don't know how to convert SQL type \"{}\"",
            other
        ))),
    }
}

fn normalize_length(length: Option<i64>) -> Option<u32> {
    match length {
        None => None,
        Some(l) if l == SQLITE_MAX_LENGTH || l < 0 => None,
        Some(l) => u32::try_from(l).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_text_types() {
        let ty = declared_type_to_type_info("NVARCHAR(100)", false, false).unwrap();
        assert_eq!(ty.basic_type, BasicType::VarText);
        assert_eq!(ty.length, Some(100));
        assert!(!ty.nullable);

        let ty = declared_type_to_type_info("NVARCHAR", true, false).unwrap();
        assert_eq!(ty.length, None);

        // The catalog reports "max" as 2147483647.
        let ty = declared_type_to_type_info("NVARCHAR(2147483647)", true, false).unwrap();
        assert_eq!(ty.length, None);
    }

    #[test]
    fn test_declared_integer_types() {
        assert_eq!(
            declared_type_to_type_info("INTEGER", false, false)
                .unwrap()
                .basic_type,
            BasicType::Long
        );
        assert_eq!(
            declared_type_to_type_info("INT", false, false)
                .unwrap()
                .basic_type,
            BasicType::Int
        );
        assert_eq!(
            declared_type_to_type_info("TINYINT", false, false)
                .unwrap()
                .basic_type,
            BasicType::Byte
        );
    }

    #[test]
    fn test_autoincrement_requires_integer() {
        let ty = declared_type_to_type_info("INTEGER", false, true).unwrap();
        assert_eq!(ty.basic_type, BasicType::Autoincrement);

        assert!(declared_type_to_type_info("INT", false, true).is_err());
        assert!(declared_type_to_type_info("NVARCHAR(10)", false, true).is_err());
    }

    #[test]
    fn test_fixed_width_types_rejected() {
        assert!(declared_type_to_type_info("CHAR(5)", false, false).is_err());
        assert!(declared_type_to_type_info("NCHAR(5)", false, false).is_err());
        assert!(declared_type_to_type_info("BINARY(8)", false, false).is_err());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = declared_type_to_type_info("GEOMETRY", false, false).unwrap_err();
        assert!(matches!(err, SchemaError::NotSupported(_)));
    }

    #[test]
    fn test_length_on_integer_rejected() {
        assert!(declared_type_to_type_info("INT(11)", false, false).is_err());
    }
}
