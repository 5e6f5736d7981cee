//! Error types for schema modelling and mutation.

use thiserror::Error;

/// Main error type for schema operations.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// A structural invariant of the schema graph was violated (duplicate
    /// name, bad length on a non-text type, dangling column reference,
    /// incompatible foreign-key types, unsupported index target).
    #[error("Schema validation failed: {0}")]
    Validation(String),

    /// A construct cannot be represented by this engine (fixed-width
    /// char/binary types, autoincrement on an unsupported base type,
    /// an operation a partial backend does not implement).
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A named table or column does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Error surfaced unmodified from the underlying SQL execution facility.
    #[error("Database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A state the engine itself should never produce.
    #[error("Internal error: {0}")]
    Internal(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    /// Wrap an error from the SQL execution facility without reinterpreting it.
    pub fn database<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SchemaError::Database(Box::new(err))
    }
}

/// Result type alias for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
