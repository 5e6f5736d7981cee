//! Database-agnostic core: the schema graph, portable types, transform
//! commands, and the traits the driver modules implement.
//!
//! - [`types`]: portable column types and engine capability flags
//! - [`schema`]: the table/column/index/foreign-key graph and its invariants
//! - [`transform`]: declarative table edits and the rebuild plan
//! - [`identifier`]: identifier validation and bracket quoting
//! - [`value`]: row and value types crossing the execution boundary
//! - [`traits`]: `SqlExecutor`, `SchemaReader`, `SchemaWriter`

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod transform;
pub mod types;
pub mod value;

pub use schema::{ColumnInfo, ForeignKeyInfo, IndexInfo, SchemaInfo, TableInfo};
pub use traits::{SchemaReader, SchemaWriter, SqlExecutor, StatementLog};
pub use transform::{RebuildColumn, RebuildPlan, TableTransform};
pub use types::{BasicType, DbEngine, DbEngines, IndexKind, TypeInfo};
pub use value::{Row, SqlValue};
