//! SQLite driver: reader, writer, and the stored-DDL parser both rely on.

pub mod ddl;
pub mod reader;
pub mod writer;

pub use reader::SqliteReader;
pub use writer::SqliteWriter;
