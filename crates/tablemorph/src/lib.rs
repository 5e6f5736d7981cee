//! # tablemorph
//!
//! Database-agnostic schema model and migration engine.
//!
//! The crate provides three layers:
//!
//! - A **schema graph** ([`SchemaInfo`] → [`TableInfo`] → columns, indexes,
//!   foreign keys) with cross-entity invariants enforced at mutation time
//!   and a JSON document round trip.
//! - Per-engine **readers** that reconstruct a validated schema graph by
//!   introspecting a live database.
//! - Per-engine **writers** that synthesize DDL from the graph, including
//!   `transform_table`: where an engine cannot alter, reorder, rename or
//!   drop a column in place, the table is rebuilt — a shadow table is
//!   created with the new structure, rows are copied through per-column SQL
//!   expressions, and the shadow is swapped in, all in one transaction.
//!
//! The database itself stays behind the [`SqlExecutor`] trait: anything that
//! can execute SQL text and return rows or an affected-row count. A writer
//! constructed without an executor produces its DDL into a [`StatementLog`]
//! only, for review and diffing.
//!
//! ## Example
//!
//! ```no_run
//! use tablemorph::{
//!     create_writer, BasicType, ColumnInfo, DbEngine, DbEngines, IndexInfo, IndexKind,
//!     SchemaInfo, SchemaWriter, TableInfo, TypeInfo,
//! };
//!
//! # async fn demo() -> tablemorph::Result<()> {
//! let mut table = TableInfo::new("Users");
//! table.add_column(ColumnInfo::new("Id", TypeInfo::new(BasicType::Autoincrement, false)))?;
//! table.add_index(IndexInfo::new("pk_Users", IndexKind::PrimaryKey, vec!["Id"]))?;
//!
//! let mut schema = SchemaInfo::new();
//! schema.add_table(table)?;
//! schema.validate(DbEngines::ALL)?;
//!
//! let log = tablemorph::StatementLog::new();
//! let writer = create_writer(DbEngine::Sqlite, None, Some(log.clone()));
//! writer.create_schema(&schema).await?;
//! for statement in log.statements() {
//!     println!("{};", statement);
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod drivers;
pub mod error;

// Re-exports for convenient access
pub use crate::core::{
    BasicType, ColumnInfo, DbEngine, DbEngines, ForeignKeyInfo, IndexInfo, IndexKind,
    RebuildColumn, RebuildPlan, Row, SchemaInfo, SchemaReader, SchemaWriter, SqlExecutor,
    SqlValue, StatementLog, TableInfo, TableTransform, TypeInfo,
};
pub use crate::drivers::{create_reader, create_writer};
pub use crate::error::{Result, SchemaError};
