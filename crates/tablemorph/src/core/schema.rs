//! The in-memory schema graph: tables, columns, indexes and foreign keys.
//!
//! The graph is an owned tree. Attachment happens through the `add_*`
//! methods, which enforce name uniqueness before mutating anything;
//! ownership transfer guarantees an entity belongs to at most one parent.
//! `remove_*` detaches by moving the entity back out.
//!
//! The types derive `Serialize`/`Deserialize` so a schema can round-trip
//! through a structured document, but serde populates fields without running
//! the `add_*` checks. A deserialized schema must therefore pass through
//! [`SchemaInfo::rehydrate`], which re-inserts every entity through the
//! normal guarded calls and re-validates the whole graph.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::types::{BasicType, DbEngine, DbEngines, IndexKind, TypeInfo};
use crate::error::{Result, SchemaError};

/// A column: a name and a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeInfo,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, ty: TypeInfo) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    /// Verifies that this column is consistent.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SchemaError::Validation(
                "Column name must not be empty".to_string(),
            ));
        }
        self.ty.validate()
    }
}

impl fmt::Display for ColumnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<ColumnInfo: {}, {}>", self.name, self.ty)
    }
}

/// An index over an ordered list of columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub column_names: Vec<String>,
    pub kind: IndexKind,
}

impl IndexInfo {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        kind: IndexKind,
        column_names: Vec<S>,
    ) -> Self {
        Self {
            name: name.into(),
            column_names: column_names.into_iter().map(Into::into).collect(),
            kind,
        }
    }

    /// Verifies that this index is consistent on its own.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SchemaError::Validation(
                "Index name must not be empty".to_string(),
            ));
        }
        if self.column_names.is_empty() {
            return Err(SchemaError::Validation(format!(
                "{} has no columns",
                self
            )));
        }
        Ok(())
    }

    /// Verifies this index against its owning table: every referenced column
    /// must exist.
    pub fn validate_in(&self, table: &TableInfo) -> Result<()> {
        self.validate()?;
        for column_name in &self.column_names {
            if !table
                .columns()
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(column_name))
            {
                return Err(SchemaError::Validation(format!(
                    "{} indexes a non-existent column [{}]",
                    self, column_name
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for IndexInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            IndexKind::Normal => "Index",
            IndexKind::Unique => "Unique Index",
            IndexKind::PrimaryKey => "Primary Key Index",
        };
        let columns: Vec<String> = self
            .column_names
            .iter()
            .map(|c| format!("[{}]", c))
            .collect();
        write!(f, "<{} {} on column(s) {}>", kind, self.name, columns.join(", "))
    }
}

/// A foreign-key constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub name: String,
    pub column_names: Vec<String>,
    pub referenced_table_name: String,
    pub referenced_column_names: Vec<String>,
}

impl ForeignKeyInfo {
    pub fn new<S: Into<String>, R: Into<String>>(
        name: impl Into<String>,
        column_names: Vec<S>,
        referenced_table_name: impl Into<String>,
        referenced_column_names: Vec<R>,
    ) -> Self {
        Self {
            name: name.into(),
            column_names: column_names.into_iter().map(Into::into).collect(),
            referenced_table_name: referenced_table_name.into(),
            referenced_column_names: referenced_column_names
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }

    /// Verifies that this foreign key is consistent on its own.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SchemaError::Validation(
                "Foreign key name must not be empty".to_string(),
            ));
        }
        if self.column_names.is_empty() {
            return Err(SchemaError::Validation(format!("{} has no columns", self)));
        }
        if self.column_names.len() != self.referenced_column_names.len() {
            return Err(SchemaError::Validation(format!(
                "{} has mismatched column counts ({} vs {})",
                self,
                self.column_names.len(),
                self.referenced_column_names.len()
            )));
        }
        Ok(())
    }

    /// Verifies this foreign key against its owning table and, when one is
    /// available, the containing schema.
    pub fn validate_in(&self, table: &TableInfo, schema: Option<&SchemaInfo>) -> Result<()> {
        self.validate()?;
        for column_name in &self.column_names {
            if !table
                .columns()
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(column_name))
            {
                return Err(SchemaError::Validation(format!(
                    "{} constrains a non-existent column [{}]",
                    self, column_name
                )));
            }
        }
        if let Some(schema) = schema {
            let referenced = schema
                .tables()
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(&self.referenced_table_name))
                .ok_or_else(|| {
                    SchemaError::Validation(format!(
                        "{} references a non-existent table [{}]",
                        self, self.referenced_table_name
                    ))
                })?;
            for referenced_column_name in &self.referenced_column_names {
                if !referenced
                    .columns()
                    .iter()
                    .any(|c| c.name.eq_ignore_ascii_case(referenced_column_name))
                {
                    return Err(SchemaError::Validation(format!(
                        "{} references a non-existent column [{}]",
                        self, referenced_column_name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for ForeignKeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<ForeignKey {} ({}) => {} ({})>",
            self.name,
            self.column_names.join(", "),
            self.referenced_table_name,
            self.referenced_column_names.join(", ")
        )
    }
}

/// A table: ordered columns, indexes and foreign keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    columns: Vec<ColumnInfo>,
    indexes: Vec<IndexInfo>,
    foreign_keys: Vec<ForeignKeyInfo>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// All columns of this table, in order.
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Returns the named column, or an error if it cannot be found.
    pub fn column(&self, column_name: &str) -> Result<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column_name))
            .ok_or_else(|| {
                SchemaError::NotFound(format!(
                    "Column [{}] does not exist in table [{}]",
                    column_name, self.name
                ))
            })
    }

    /// Attach a column. Fails fast, leaving the table unchanged, if a column
    /// with the same name (case-insensitive) already exists.
    pub fn add_column(&mut self, column: ColumnInfo) -> Result<()> {
        if self
            .columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&column.name))
        {
            return Err(SchemaError::Validation(format!(
                "A column named [{}] already exists in table [{}]",
                column.name, self.name
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Detach and return the named column, or None if absent.
    pub fn remove_column(&mut self, column_name: &str) -> Option<ColumnInfo> {
        let pos = self
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(column_name))?;
        Some(self.columns.remove(pos))
    }

    /// All indexes of this table (including PrimaryKey and Unique kinds).
    pub fn indexes(&self) -> &[IndexInfo] {
        &self.indexes
    }

    /// Attach an index. Fails fast on a duplicate index name within this
    /// table, or on a second PrimaryKey-kind index.
    pub fn add_index(&mut self, index: IndexInfo) -> Result<()> {
        if self
            .indexes
            .iter()
            .any(|i| i.name.eq_ignore_ascii_case(&index.name))
        {
            return Err(SchemaError::Validation(format!(
                "Index [{}] has the same name as another index on table [{}]",
                index.name, self.name
            )));
        }
        if index.kind == IndexKind::PrimaryKey && self.primary_key().is_some() {
            return Err(SchemaError::Validation(format!(
                "Table [{}] already has a primary key; cannot add index [{}]",
                self.name, index.name
            )));
        }
        self.indexes.push(index);
        Ok(())
    }

    /// All foreign keys of this table.
    pub fn foreign_keys(&self) -> &[ForeignKeyInfo] {
        &self.foreign_keys
    }

    /// Attach a foreign key. Fails fast on a duplicate name within this table.
    pub fn add_foreign_key(&mut self, foreign_key: ForeignKeyInfo) -> Result<()> {
        if self
            .foreign_keys
            .iter()
            .any(|fk| fk.name.eq_ignore_ascii_case(&foreign_key.name))
        {
            return Err(SchemaError::Validation(format!(
                "Foreign key [{}] has the same name as another foreign key on table [{}]",
                foreign_key.name, self.name
            )));
        }
        self.foreign_keys.push(foreign_key);
        Ok(())
    }

    /// The primary key index if one is defined for this table.
    pub fn primary_key(&self) -> Option<&IndexInfo> {
        self.indexes.iter().find(|i| i.kind == IndexKind::PrimaryKey)
    }

    /// All unique-constraint indexes defined on this table.
    pub fn unique_constraints(&self) -> impl Iterator<Item = &IndexInfo> {
        self.indexes.iter().filter(|i| i.kind == IndexKind::Unique)
    }

    /// Whether the named column is listed by the table's primary key.
    pub fn is_pk_column(&self, column_name: &str) -> bool {
        self.primary_key().is_some_and(|pk| {
            pk.column_names
                .iter()
                .any(|cn| cn.eq_ignore_ascii_case(column_name))
        })
    }

    /// Verifies that this table is consistent.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SchemaError::Validation(
                "Table name must not be empty".to_string(),
            ));
        }
        if self.columns.is_empty() {
            return Err(SchemaError::Validation(format!(
                "{} has no columns defined",
                self
            )));
        }
        for column in &self.columns {
            column.validate()?;
        }
        check_distinct(self.columns.iter().map(|c| c.name.as_str()), |name| {
            format!("Duplicate column name in table [{}]: [{}]", self.name, name)
        })?;
        for index in &self.indexes {
            index.validate_in(self)?;
        }
        check_distinct(self.indexes.iter().map(|i| i.name.as_str()), |name| {
            format!("Duplicate index name in table [{}]: [{}]", self.name, name)
        })?;
        if self
            .indexes
            .iter()
            .filter(|i| i.kind == IndexKind::PrimaryKey)
            .count()
            > 1
        {
            return Err(SchemaError::Validation(format!(
                "Table [{}] has more than one primary key index",
                self.name
            )));
        }
        for foreign_key in &self.foreign_keys {
            foreign_key.validate_in(self, None)?;
        }
        check_distinct(self.foreign_keys.iter().map(|fk| fk.name.as_str()), |name| {
            format!(
                "Duplicate foreign-key name in table [{}]: [{}]",
                self.name, name
            )
        })?;
        Ok(())
    }

    /// Re-insert every column/index/foreign key through the guarded `add_*`
    /// calls and re-validate. Part of the two-phase deserialization load.
    pub(crate) fn rehydrate(&mut self) -> Result<()> {
        let columns = std::mem::take(&mut self.columns);
        for column in columns {
            self.add_column(column)?;
        }
        let indexes = std::mem::take(&mut self.indexes);
        for index in indexes {
            self.add_index(index)?;
        }
        let foreign_keys = std::mem::take(&mut self.foreign_keys);
        for foreign_key in foreign_keys {
            self.add_foreign_key(foreign_key)?;
        }
        self.validate()
    }
}

impl fmt::Display for TableInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<TableInfo: {}, {} column(s)>",
            self.name,
            self.columns.len()
        )
    }
}

/// An owning container of tables with schema-wide invariants.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaInfo {
    tables: Vec<TableInfo>,
}

impl SchemaInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// All tables in this schema.
    pub fn tables(&self) -> &[TableInfo] {
        &self.tables
    }

    /// Returns the named table, or an error if it cannot be found.
    pub fn table(&self, table_name: &str) -> Result<&TableInfo> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(table_name))
            .ok_or_else(|| {
                SchemaError::NotFound(format!(
                    "Table [{}] does not exist in this schema",
                    table_name
                ))
            })
    }

    /// Attach a table.
    ///
    /// Fails fast, leaving the schema unchanged, if the table's name clashes
    /// with an existing table (case-insensitive), or if any of its index or
    /// foreign-key names clash with an index or foreign key anywhere in the
    /// schema — those names are global.
    pub fn add_table(&mut self, table: TableInfo) -> Result<()> {
        if self
            .tables
            .iter()
            .any(|t| t.name.eq_ignore_ascii_case(&table.name))
        {
            return Err(SchemaError::Validation(format!(
                "A table named [{}] already exists in this schema",
                table.name
            )));
        }
        for index in table.indexes() {
            if let Some((owner, _)) = self
                .indexes()
                .find(|(_, i)| i.name.eq_ignore_ascii_case(&index.name))
            {
                return Err(SchemaError::Validation(format!(
                    "Index [{}] on table [{}] has the same name as an index on table [{}]",
                    index.name, table.name, owner.name
                )));
            }
        }
        for foreign_key in table.foreign_keys() {
            if let Some((owner, _)) = self
                .foreign_keys()
                .find(|(_, fk)| fk.name.eq_ignore_ascii_case(&foreign_key.name))
            {
                return Err(SchemaError::Validation(format!(
                    "Foreign key [{}] on table [{}] has the same name as a foreign key on table [{}]",
                    foreign_key.name, table.name, owner.name
                )));
            }
        }
        self.tables.push(table);
        Ok(())
    }

    /// Detach and return the named table, or None if absent.
    pub fn remove_table(&mut self, table_name: &str) -> Option<TableInfo> {
        let pos = self
            .tables
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(table_name))?;
        Some(self.tables.remove(pos))
    }

    /// All indexes defined in this schema, paired with their owning table.
    pub fn indexes(&self) -> impl Iterator<Item = (&TableInfo, &IndexInfo)> {
        self.tables
            .iter()
            .flat_map(|t| t.indexes().iter().map(move |i| (t, i)))
    }

    /// All foreign keys defined in this schema, paired with their owning table.
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&TableInfo, &ForeignKeyInfo)> {
        self.tables
            .iter()
            .flat_map(|t| t.foreign_keys().iter().map(move |fk| (t, fk)))
    }

    /// Verifies the whole schema against the given set of target engines.
    ///
    /// Fails fast on the first violation found.
    pub fn validate(&self, supported_engines: DbEngines) -> Result<()> {
        check_distinct(self.tables.iter().map(|t| t.name.as_str()), |name| {
            format!("Duplicate table name: [{}]", name)
        })?;

        for table in &self.tables {
            table.validate()?;
        }

        check_distinct(self.foreign_keys().map(|(_, fk)| fk.name.as_str()), |name| {
            format!("Duplicate foreign-key name: [{}]", name)
        })?;
        for (table, foreign_key) in self.foreign_keys() {
            foreign_key.validate_in(table, Some(self))?;
            let referenced_table = self.table(&foreign_key.referenced_table_name)?;
            for (column_name, referenced_column_name) in foreign_key
                .column_names
                .iter()
                .zip(&foreign_key.referenced_column_names)
            {
                let column = table.column(column_name)?;
                let referenced_column = referenced_table.column(referenced_column_name)?;
                if !column
                    .ty
                    .is_foreign_key_compatible_with(&referenced_column.ty)
                {
                    return Err(SchemaError::Validation(format!(
                        "Foreign key [{}] ([{}] => [{}]): columns [{}] => [{}] use types \
                         incompatible for foreign key purposes in some DBMSs ({} vs {})",
                        foreign_key.name,
                        table.name,
                        referenced_table.name,
                        column.name,
                        referenced_column.name,
                        column.ty,
                        referenced_column.ty
                    )));
                }
            }
        }

        check_distinct(self.indexes().map(|(_, i)| i.name.as_str()), |name| {
            format!("Duplicate index name: [{}]", name)
        })?;
        for (table, index) in self.indexes() {
            for column_name in &index.column_names {
                let column = table.column(column_name)?;
                if supported_engines.contains(DbEngine::SqlServer) {
                    // SQL Server cannot index NVAR*(MAX) columns.
                    let unbounded_var = (column.ty.basic_type == BasicType::VarText
                        || column.ty.basic_type == BasicType::VarBinary)
                        && column.ty.length.is_none();
                    if unbounded_var {
                        return Err(SchemaError::Validation(format!(
                            "Index [{}] on table [{}] references column [{}], which is of \
                             type {:?} with maximum length; SQL Server cannot index such columns",
                            index.name, table.name, column.name, column.ty.basic_type
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Re-establish invariants after a structural deserialization.
    ///
    /// Serde populates fields directly without invoking the guarded `add_*`
    /// calls, so a loaded schema must be rehydrated: every table, column,
    /// index and foreign key is re-inserted through the normal checks and
    /// the whole graph is validated against `supported_engines`.
    pub fn rehydrate(mut self, supported_engines: DbEngines) -> Result<SchemaInfo> {
        let tables = std::mem::take(&mut self.tables);
        for mut table in tables {
            table.rehydrate()?;
            self.add_table(table)?;
        }
        self.validate(supported_engines)?;
        Ok(self)
    }

    /// Serialize this schema to a JSON document.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a schema from a JSON document, running the rehydrate pass.
    pub fn from_json(json: &str, supported_engines: DbEngines) -> Result<SchemaInfo> {
        let schema: SchemaInfo = serde_json::from_str(json)?;
        schema.rehydrate(supported_engines)
    }
}

impl fmt::Display for SchemaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<SchemaInfo: {} table(s)>", self.tables.len())
    }
}

/// Fail with `message(name)` on the first case-insensitive duplicate.
fn check_distinct<'a>(
    names: impl Iterator<Item = &'a str>,
    message: impl Fn(&str) -> String,
) -> Result<()> {
    let mut seen: Vec<String> = Vec::new();
    for name in names {
        let lowered = name.to_ascii_lowercase();
        if seen.contains(&lowered) {
            return Err(SchemaError::Validation(message(name)));
        }
        seen.push(lowered);
    }
    Ok(())
}
