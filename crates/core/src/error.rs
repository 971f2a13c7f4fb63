//! Errors raised by the schema and object model

use crate::schema::FieldType;
use crate::types::{BaseId, FieldId};
use thiserror::Error;

/// Schema and value misuse
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Base id not present in the schema
    #[error("unknown base {0}")]
    UnknownBase(BaseId),

    /// Field id not defined on the base
    #[error("base {base} has no field {field}")]
    UnknownField {
        /// Base searched
        base: BaseId,
        /// Missing field
        field: FieldId,
    },

    /// Field name not defined on the base
    #[error("base {base} has no field named '{name}'")]
    UnknownFieldName {
        /// Base searched
        base: BaseId,
        /// Missing name
        name: String,
    },

    /// Custom field declared with a built-in id
    #[error("field {field} on base {base} uses a reserved built-in id")]
    ReservedField {
        /// Base being defined
        base: BaseId,
        /// Offending field id
        field: FieldId,
    },

    /// Field id or name declared twice
    #[error("field '{name}' declared twice on base {base}")]
    DuplicateField {
        /// Base being defined
        base: BaseId,
        /// Duplicate name
        name: String,
    },

    /// Value does not match the field definition
    #[error("field {field} expects {expected} (vector: {array}), got {actual}")]
    TypeMismatch {
        /// Field being assigned
        field: FieldId,
        /// Declared element type
        expected: FieldType,
        /// Whether the field is a vector
        array: bool,
        /// Description of the supplied value
        actual: String,
    },

    /// Value too large to be written to the journal or a dump
    #[error("field {field}: {what} of length {len} exceeds the limit of {max}")]
    ValueTooLong {
        /// Field being assigned
        field: FieldId,
        /// What was measured: string bytes, address octets or vector elements
        what: &'static str,
        /// Measured length
        len: usize,
        /// Largest accepted length
        max: usize,
    },
}

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, Error>;
