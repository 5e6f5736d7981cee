//! SQL Server driver.

pub mod reader;
pub mod writer;

pub use reader::MssqlReader;
pub use writer::MssqlWriter;
