//! Declarative table transforms and the rebuild plan derived from them.
//!
//! A [`TableTransform`] is pure data; applying a list of them to a table
//! produces a [`RebuildPlan`]: the ordered list of result columns, each
//! paired with the SQL expression that populates it from the old table
//! (aliased `oldtable`) during the rebuild copy.

use crate::core::identifier::quote;
use crate::core::schema::{ColumnInfo, TableInfo};
use crate::core::types::BasicType;
use crate::error::{Result, SchemaError};

/// A change to the structure of a database table.
///
/// Columns are identified by name against the structure as it stands when
/// the transform is applied: after a `RenameColumn`, later transforms must
/// use the new name.
#[derive(Debug, Clone)]
pub enum TableTransform {
    /// Add a new column at `at_index` (clamped to the column count;
    /// `usize::MAX` inserts at the end). `populate` is a SQL expression over
    /// the alias `oldtable` supplying the value for existing rows; when
    /// None, `NULL` is used — which fails the copy for non-nullable types,
    /// so a populate expression is required for those in practice.
    AddColumn {
        column: ColumnInfo,
        at_index: usize,
        populate: Option<String>,
    },
    /// Move an existing column to `new_index` (clamped).
    MoveColumn { column: String, new_index: usize },
    /// Rename an existing column, keeping its type and stored data.
    RenameColumn { column: String, new_name: String },
    /// Delete an existing column and its data.
    DeleteColumn { column: String },
}

impl TableTransform {
    /// The name of the pre-existing column this transform targets, if any.
    fn target_column(&self) -> Option<&str> {
        match self {
            TableTransform::AddColumn { .. } => None,
            TableTransform::MoveColumn { column, .. }
            | TableTransform::RenameColumn { column, .. }
            | TableTransform::DeleteColumn { column } => Some(column),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            TableTransform::AddColumn { .. } => "AddColumn",
            TableTransform::MoveColumn { .. } => "MoveColumn",
            TableTransform::RenameColumn { .. } => "RenameColumn",
            TableTransform::DeleteColumn { .. } => "DeleteColumn",
        }
    }
}

/// One column of the rebuilt table: its definition plus the SQL expression
/// that sources its value from the old table during the copy.
#[derive(Debug, Clone)]
pub struct RebuildColumn {
    pub column: ColumnInfo,
    pub source: String,
}

/// The result structure of a table rebuild.
#[derive(Debug, Clone)]
pub struct RebuildPlan {
    columns: Vec<RebuildColumn>,
}

impl RebuildPlan {
    /// Apply `transforms` in order to `table`'s current structure.
    ///
    /// Fails, before any SQL is emitted, if a transform references a column
    /// that does not belong to the table, if a transform targets an entry
    /// that an earlier transform removed, or if the resulting structure
    /// would contain two columns with the same name.
    pub fn new(table: &TableInfo, transforms: &[TableTransform]) -> Result<RebuildPlan> {
        for transform in transforms {
            if let Some(column_name) = transform.target_column() {
                if table.column(column_name).is_err() {
                    return Err(SchemaError::Validation(format!(
                        "TransformTable: the column [{}] specified in {} does not belong to \
                         table [{}]",
                        column_name,
                        transform.kind_name(),
                        table.name
                    )));
                }
            }
        }

        let mut columns: Vec<RebuildColumn> = table
            .columns()
            .iter()
            .map(|c| {
                Ok(RebuildColumn {
                    column: c.clone(),
                    source: format!("oldtable.{}", quote(&c.name)?),
                })
            })
            .collect::<Result<_>>()?;

        for transform in transforms {
            match transform {
                TableTransform::AddColumn {
                    column,
                    at_index,
                    populate,
                } => {
                    let index = (*at_index).min(columns.len());
                    columns.insert(
                        index,
                        RebuildColumn {
                            column: column.clone(),
                            source: populate.clone().unwrap_or_else(|| "NULL".to_string()),
                        },
                    );
                }
                TableTransform::MoveColumn { column, new_index } => {
                    let pos = position_of(&columns, column, "MoveColumn")?;
                    let entry = columns.remove(pos);
                    columns.insert((*new_index).min(columns.len()), entry);
                }
                TableTransform::RenameColumn { column, new_name } => {
                    let pos = position_of(&columns, column, "RenameColumn")?;
                    // The source expression still reads the old column.
                    columns[pos].column =
                        ColumnInfo::new(new_name.clone(), columns[pos].column.ty.clone());
                }
                TableTransform::DeleteColumn { column } => {
                    let pos = position_of(&columns, column, "DeleteColumn")?;
                    columns.remove(pos);
                }
            }
        }

        for (i, a) in columns.iter().enumerate() {
            for b in &columns[i + 1..] {
                if a.column.name.eq_ignore_ascii_case(&b.column.name) {
                    return Err(SchemaError::Validation(format!(
                        "TransformTable: after applying the transformations, the table would \
                         have two columns named [{}]; column names must be unique",
                        a.column.name
                    )));
                }
            }
        }

        Ok(RebuildPlan { columns })
    }

    /// The rebuilt column list, in order.
    pub fn columns(&self) -> &[RebuildColumn] {
        &self.columns
    }

    /// Whether any result column is of Autoincrement type.
    pub fn has_autoincrement(&self) -> bool {
        self.columns
            .iter()
            .any(|c| c.column.ty.basic_type == BasicType::Autoincrement)
    }

    /// The result columns that carry over the table's primary key, in plan
    /// order: those whose (possibly new) name appears in the original
    /// primary key's column list.
    pub fn pk_column_names(&self, table: &TableInfo) -> Vec<String> {
        match table.primary_key() {
            Some(pk) => self
                .columns
                .iter()
                .filter(|c| {
                    pk.column_names
                        .iter()
                        .any(|cn| cn.eq_ignore_ascii_case(&c.column.name))
                })
                .map(|c| c.column.name.clone())
                .collect(),
            None => Vec::new(),
        }
    }
}

fn position_of(columns: &[RebuildColumn], name: &str, kind: &str) -> Result<usize> {
    columns
        .iter()
        .position(|c| c.column.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            SchemaError::Validation(format!(
                "TransformTable: the {} transformation refers to a column that doesn't exist \
                 or has been removed: [{}]",
                kind, name
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::IndexInfo;
    use crate::core::types::{IndexKind, TypeInfo};

    fn table() -> TableInfo {
        let mut t = TableInfo::new("T");
        t.add_column(ColumnInfo::new(
            "id",
            TypeInfo::new(BasicType::Autoincrement, false),
        ))
        .unwrap();
        t.add_column(ColumnInfo::new("a", TypeInfo::new(BasicType::Int, false)))
            .unwrap();
        t.add_column(ColumnInfo::new(
            "b",
            TypeInfo::with_length(BasicType::VarText, false, 100),
        ))
        .unwrap();
        t.add_index(IndexInfo::new("pk_T", IndexKind::PrimaryKey, vec!["id"]))
            .unwrap();
        t
    }

    fn names(plan: &RebuildPlan) -> Vec<&str> {
        plan.columns()
            .iter()
            .map(|c| c.column.name.as_str())
            .collect()
    }

    #[test]
    fn test_rename_move_add_scenario() {
        // T(id PK autoincrement, a int, b varchar):
        // rename a -> a2, move b to 0, add c int populated "0" at 1.
        let plan = RebuildPlan::new(
            &table(),
            &[
                TableTransform::RenameColumn {
                    column: "a".to_string(),
                    new_name: "a2".to_string(),
                },
                TableTransform::MoveColumn {
                    column: "b".to_string(),
                    new_index: 0,
                },
                TableTransform::AddColumn {
                    column: ColumnInfo::new("c", TypeInfo::new(BasicType::Int, false)),
                    at_index: 1,
                    populate: Some("0".to_string()),
                },
            ],
        )
        .unwrap();

        assert_eq!(names(&plan), vec!["b", "c", "id", "a2"]);
        let sources: Vec<&str> = plan.columns().iter().map(|c| c.source.as_str()).collect();
        assert_eq!(
            sources,
            vec!["oldtable.[b]", "0", "oldtable.[id]", "oldtable.[a]"]
        );
        // id keeps its primary-key/autoincrement role.
        assert_eq!(plan.pk_column_names(&table()), vec!["id"]);
        assert!(plan.has_autoincrement());
    }

    #[test]
    fn test_add_index_clamps() {
        let plan = RebuildPlan::new(
            &table(),
            &[TableTransform::AddColumn {
                column: ColumnInfo::new("z", TypeInfo::new(BasicType::Int, true)),
                at_index: usize::MAX,
                populate: None,
            }],
        )
        .unwrap();
        assert_eq!(names(&plan), vec!["id", "a", "b", "z"]);
        assert_eq!(plan.columns()[3].source, "NULL");
    }

    #[test]
    fn test_move_index_clamps() {
        let plan = RebuildPlan::new(
            &table(),
            &[TableTransform::MoveColumn {
                column: "id".to_string(),
                new_index: usize::MAX,
            }],
        )
        .unwrap();
        assert_eq!(names(&plan), vec!["a", "b", "id"]);
    }

    #[test]
    fn test_unknown_column_fails_before_any_work() {
        let err = RebuildPlan::new(
            &table(),
            &[TableTransform::DeleteColumn {
                column: "missing".to_string(),
            }],
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not belong"));
    }

    #[test]
    fn test_transform_after_delete_fails() {
        let err = RebuildPlan::new(
            &table(),
            &[
                TableTransform::DeleteColumn {
                    column: "a".to_string(),
                },
                TableTransform::MoveColumn {
                    column: "a".to_string(),
                    new_index: 0,
                },
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("has been removed"));
    }

    // Transforms address columns by name as the structure evolves: once a
    // column is renamed, its old name no longer resolves.
    #[test]
    fn test_old_name_unavailable_after_rename() {
        let err = RebuildPlan::new(
            &table(),
            &[
                TableTransform::RenameColumn {
                    column: "a".to_string(),
                    new_name: "a2".to_string(),
                },
                TableTransform::MoveColumn {
                    column: "a".to_string(),
                    new_index: 0,
                },
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("doesn't exist"));
    }

    #[test]
    fn test_duplicate_result_name_rejected() {
        let err = RebuildPlan::new(
            &table(),
            &[TableTransform::RenameColumn {
                column: "a".to_string(),
                new_name: "B".to_string(),
            }],
        )
        .unwrap_err();
        assert!(err.to_string().contains("two columns named"));
    }

    #[test]
    fn test_renamed_pk_column_drops_out_of_pk() {
        // PK membership is matched against result names; renaming a PK
        // column therefore drops it from the reconstructed key.
        let plan = RebuildPlan::new(
            &table(),
            &[TableTransform::RenameColumn {
                column: "id".to_string(),
                new_name: "ident".to_string(),
            }],
        )
        .unwrap();
        assert!(plan.pk_column_names(&table()).is_empty());
    }
}
