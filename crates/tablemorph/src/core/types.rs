//! Portable column types and engine capability flags.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};

/// The closed set of portable column type tags.
///
/// Fixed-width char/binary types are deliberately absent; retrievers reject
/// them with [`SchemaError::NotSupported`] when encountered in a live catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasicType {
    VarText,
    VarBinary,
    Boolean,
    Autoincrement,
    Byte,
    Short,
    Int,
    Long,
    Double,
    DateTime,
}

/// Index classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    Normal,
    Unique,
    PrimaryKey,
}

/// A column type: basic type plus nullability and optional length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    /// One of the fundamental underlying data types.
    pub basic_type: BasicType,

    /// Whether the type is nullable.
    pub nullable: bool,

    /// For VarText and VarBinary, the length in characters/bytes, or None if
    /// the longest possible value is used. For all other types, always None.
    pub length: Option<u32>,
}

impl TypeInfo {
    /// Create a type with no length.
    pub fn new(basic_type: BasicType, nullable: bool) -> Self {
        Self {
            basic_type,
            nullable,
            length: None,
        }
    }

    /// Create a VarText/VarBinary type with an explicit length.
    pub fn with_length(basic_type: BasicType, nullable: bool, length: u32) -> Self {
        Self {
            basic_type,
            nullable,
            length: Some(length),
        }
    }

    /// Verifies that this type is consistent.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Validation`] if a length is specified on a
    /// basic type other than VarText/VarBinary.
    pub fn validate(&self) -> Result<()> {
        if self.basic_type != BasicType::VarText
            && self.basic_type != BasicType::VarBinary
            && self.length.is_some()
        {
            return Err(SchemaError::Validation(format!(
                "The length must be None for the basic type {:?}",
                self.basic_type
            )));
        }
        Ok(())
    }

    /// Whether a foreign key may link a column of this type to a column of
    /// the other type.
    ///
    /// Autoincrement is treated as interchangeable with Long; once that is
    /// accounted for, the basic types and lengths must match exactly.
    pub fn is_foreign_key_compatible_with(&self, other: &TypeInfo) -> bool {
        let autoincrement_like =
            |t: BasicType| t == BasicType::Autoincrement || t == BasicType::Long;
        if self.basic_type == BasicType::Autoincrement && !autoincrement_like(other.basic_type) {
            false
        } else if other.basic_type == BasicType::Autoincrement
            && !autoincrement_like(self.basic_type)
        {
            false
        } else if self.basic_type != other.basic_type
            && self.basic_type != BasicType::Autoincrement
            && other.basic_type != BasicType::Autoincrement
        {
            false
        } else {
            self.length == other.length
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Type: {:?}, {}",
            self.basic_type,
            if self.nullable { "NULL" } else { "NOT NULL" }
        )?;
        if let Some(len) = self.length {
            write!(f, ", len={}", len)?;
        }
        Ok(())
    }
}

/// One concrete target database engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DbEngine {
    Sqlite,
    SqlServer,
    Postgres,
}

impl DbEngine {
    /// The engine identifier used in logs and factory lookups.
    pub fn name(&self) -> &'static str {
        match self {
            DbEngine::Sqlite => "sqlite",
            DbEngine::SqlServer => "sqlserver",
            DbEngine::Postgres => "postgres",
        }
    }
}

/// A set of database engines, used as a capability flag during validation:
/// a schema validated against a set must avoid constructs unsupported by any
/// engine in that set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DbEngines(u8);

impl DbEngines {
    pub const NONE: DbEngines = DbEngines(0);
    pub const SQLITE: DbEngines = DbEngines(1);
    pub const SQL_SERVER: DbEngines = DbEngines(2);
    pub const POSTGRES: DbEngines = DbEngines(4);
    pub const ALL: DbEngines = DbEngines(1 | 2 | 4);

    /// Whether this set contains the given engine.
    pub fn contains(self, engine: DbEngine) -> bool {
        self.0 & DbEngines::from(engine).0 != 0
    }
}

impl From<DbEngine> for DbEngines {
    fn from(engine: DbEngine) -> Self {
        match engine {
            DbEngine::Sqlite => DbEngines::SQLITE,
            DbEngine::SqlServer => DbEngines::SQL_SERVER,
            DbEngine::Postgres => DbEngines::POSTGRES,
        }
    }
}

impl BitOr for DbEngines {
    type Output = DbEngines;

    fn bitor(self, rhs: DbEngines) -> DbEngines {
        DbEngines(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_rejected_on_non_text_types() {
        let ty = TypeInfo::with_length(BasicType::Boolean, false, 5);
        assert!(ty.validate().is_err());

        let ty = TypeInfo::with_length(BasicType::Int, true, 1);
        assert!(ty.validate().is_err());
    }

    #[test]
    fn test_length_accepted_on_var_types() {
        assert!(TypeInfo::new(BasicType::VarText, true).validate().is_ok());
        assert!(TypeInfo::with_length(BasicType::VarText, true, 100)
            .validate()
            .is_ok());
        assert!(TypeInfo::with_length(BasicType::VarBinary, false, 16)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_autoincrement_compatible_with_long() {
        let auto = TypeInfo::new(BasicType::Autoincrement, false);
        let long = TypeInfo::new(BasicType::Long, false);
        assert!(auto.is_foreign_key_compatible_with(&long));
        assert!(long.is_foreign_key_compatible_with(&auto));
        assert!(auto.is_foreign_key_compatible_with(&auto));
    }

    #[test]
    fn test_int_not_compatible_with_long() {
        let int = TypeInfo::new(BasicType::Int, false);
        let long = TypeInfo::new(BasicType::Long, false);
        assert!(!int.is_foreign_key_compatible_with(&long));
        assert!(!long.is_foreign_key_compatible_with(&int));

        let auto = TypeInfo::new(BasicType::Autoincrement, false);
        assert!(!int.is_foreign_key_compatible_with(&auto));
    }

    #[test]
    fn test_lengths_must_match_for_fk() {
        let a = TypeInfo::with_length(BasicType::VarText, false, 100);
        let b = TypeInfo::with_length(BasicType::VarText, false, 50);
        let unbounded = TypeInfo::new(BasicType::VarText, false);
        assert!(!a.is_foreign_key_compatible_with(&b));
        assert!(!a.is_foreign_key_compatible_with(&unbounded));
        assert!(a.is_foreign_key_compatible_with(&a.clone()));
    }

    #[test]
    fn test_type_display() {
        let ty = TypeInfo::with_length(BasicType::VarText, false, 100);
        assert_eq!(ty.to_string(), "Type: VarText, NOT NULL, len=100");
        let ty = TypeInfo::new(BasicType::Int, true);
        assert_eq!(ty.to_string(), "Type: Int, NULL");
    }

    #[test]
    fn test_engine_sets() {
        let set = DbEngines::SQLITE | DbEngines::SQL_SERVER;
        assert!(set.contains(DbEngine::Sqlite));
        assert!(set.contains(DbEngine::SqlServer));
        assert!(!set.contains(DbEngine::Postgres));
        assert!(DbEngines::ALL.contains(DbEngine::Postgres));
        assert!(!DbEngines::NONE.contains(DbEngine::Sqlite));
    }
}
