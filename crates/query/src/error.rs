//! Query validation errors
//!
//! Evaluation never fails; these errors come only from
//! [`validate`](crate::validate), which checks a tree against a schema
//! before it is used for a scan.

use dirstore_core::{FieldId, FieldType};
use thiserror::Error;

/// A problem with a query tree under a given schema
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Field id not defined on the base
    #[error("unknown field {0}")]
    UnknownField(FieldId),

    /// Field name not defined on the base
    #[error("unknown field '{0}'")]
    UnknownFieldName(String),

    /// Scalar comparator applied to a vector field without an array operator
    #[error("field {0} is a vector; use an array operator")]
    VectorNeedsArrayOp(FieldId),

    /// Array operator applied to a scalar field
    #[error("field {0} is not a vector")]
    ArrayOpOnScalar(FieldId),

    /// Length operator with a non-integer literal
    #[error("length comparison needs an integer literal")]
    LengthNeedsInt,

    /// Literal type cannot be compared with the field
    #[error("cannot compare {field_type} field {field} with a {literal} literal")]
    LiteralMismatch {
        /// Field under test
        field: FieldId,
        /// Field's element type
        field_type: FieldType,
        /// Literal's type name
        literal: &'static str,
    },

    /// Comparator not supported for the field's type
    #[error("comparator {comparator} is not supported on {field_type} values")]
    UnsupportedComparator {
        /// Comparator symbol
        comparator: String,
        /// Field's element type
        field_type: FieldType,
    },

    /// Regular expression failed to compile
    #[error("invalid regular expression '{pattern}': {reason}")]
    BadRegex {
        /// Pattern text
        pattern: String,
        /// Compiler message
        reason: String,
    },
}

/// Result type for query validation
pub type Result<T> = std::result::Result<T, QueryError>;
