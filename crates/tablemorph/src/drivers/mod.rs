//! Database driver implementations.
//!
//! Each driver module implements the core traits for one engine:
//!
//! - [`sqlite`]: SQLite (full reader and writer)
//! - [`mssql`]: Microsoft SQL Server (full reader and writer)
//! - [`postgres`]: PostgreSQL (partial reader, writer not implemented)
//!
//! The reader/writer pair for an engine is selected at construction time
//! through the factory functions below; callers hold `Box<dyn SchemaReader>`
//! / `Box<dyn SchemaWriter>` and never branch on the engine themselves.
//!
//! # Adding a new engine
//!
//! 1. Create a module under `drivers/` with `reader.rs` and `writer.rs`
//! 2. Implement `SchemaReader` and `SchemaWriter`
//! 3. Add the engine to [`DbEngine`] and to the factories below

pub mod mssql;
pub mod postgres;
pub mod sqlite;

pub use mssql::{MssqlReader, MssqlWriter};
pub use postgres::{PostgresReader, PostgresWriter};
pub use sqlite::{SqliteReader, SqliteWriter};

use std::sync::Arc;

use crate::core::traits::{SchemaReader, SchemaWriter, SqlExecutor, StatementLog};
use crate::core::types::DbEngine;

/// Create the schema reader for `engine` over an open connection.
pub fn create_reader(engine: DbEngine, executor: Arc<dyn SqlExecutor>) -> Box<dyn SchemaReader> {
    match engine {
        DbEngine::Sqlite => Box::new(SqliteReader::new(executor)),
        DbEngine::SqlServer => Box::new(MssqlReader::new(executor)),
        DbEngine::Postgres => Box::new(PostgresReader::new(executor)),
    }
}

/// Create the schema writer for `engine`.
///
/// Pass `executor: None` for log-only mode: the writer produces its DDL into
/// `log` without any database interaction.
pub fn create_writer(
    engine: DbEngine,
    executor: Option<Arc<dyn SqlExecutor>>,
    log: Option<StatementLog>,
) -> Box<dyn SchemaWriter> {
    match engine {
        DbEngine::Sqlite => {
            let writer = SqliteWriter::new(executor);
            Box::new(match log {
                Some(log) => writer.with_log(log),
                None => writer,
            })
        }
        DbEngine::SqlServer => {
            let writer = MssqlWriter::new(executor);
            Box::new(match log {
                Some(log) => writer.with_log(log),
                None => writer,
            })
        }
        DbEngine::Postgres => {
            let writer = PostgresWriter::new(executor);
            Box::new(match log {
                Some(log) => writer.with_log(log),
                None => writer,
            })
        }
    }
}
