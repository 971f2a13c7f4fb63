//! Storage layer errors

use dirstore_core::{BaseId, Invid};
use thiserror::Error;

/// Errors raised by base and namespace tables
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Base id not registered
    #[error("unknown base {0}")]
    UnknownBase(BaseId),

    /// Base id already registered
    #[error("base {0} already exists")]
    BaseExists(BaseId),

    /// Base still holds objects or check-outs
    #[error("base {base} is in use ({objects} objects, {checkouts} checked out)")]
    BaseInUse {
        /// Base that could not be removed
        base: BaseId,
        /// Live objects remaining
        objects: usize,
        /// Objects checked out by sessions
        checkouts: usize,
    },

    /// Namespace name already registered
    #[error("namespace '{0}' already exists")]
    NamespaceExists(String),

    /// Object not present in its base
    #[error("object {0} not found")]
    ObjectNotFound(Invid),
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
