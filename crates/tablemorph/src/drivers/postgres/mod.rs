//! PostgreSQL driver (partial: column retrieval only).

pub mod reader;
pub mod writer;

pub use reader::PostgresReader;
pub use writer::PostgresWriter;
