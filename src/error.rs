//! Unified error type for dirstore.
//!
//! This module folds the per-layer errors into one enum that sorts
//! failures by what the caller should do about them.

use dirstore_durability::JournalError;
use dirstore_engine::StoreError;
use dirstore_query::QueryError;
use thiserror::Error;

/// All dirstore errors.
///
/// This is the error type returned by the facade's convenience functions.
/// The engine's own [`StoreError`] converts into it.
#[derive(Debug, Error)]
pub enum Error {
    /// Base, object, field or namespace does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The API was used out of order (no transaction, lock not held, ...)
    #[error("misuse: {0}")]
    Misuse(String),

    /// A lock wait was aborted
    #[error("lock cancelled")]
    Cancelled,

    /// Commit refused by a namespace or hook; the transaction is still open
    #[error("conflict: {0}")]
    Conflict(String),

    /// Query does not fit its base
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Journal or dump content could not be decoded
    #[error("corruption: {0}")]
    Corruption(String),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for dirstore operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Conflicts leave the transaction open; it can be changed and
    /// committed again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this is a conflict error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::Corruption(_) | Error::Internal(_))
    }
}

// Convert from journal and dump errors
impl From<JournalError> for Error {
    fn from(e: JournalError) -> Self {
        match e {
            JournalError::Io(io) => Error::Io(io),
            JournalError::StringTooLong(_) => Error::Misuse(e.to_string()),
            JournalError::Poisoned => Error::Internal(e.to_string()),
            other => Error::Corruption(other.to_string()),
        }
    }
}

// Convert from engine errors
impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        if e.is_cancelled() {
            return Error::Cancelled;
        }
        if e.is_misuse() {
            return Error::Misuse(e.to_string());
        }
        match e {
            StoreError::UnknownBase(_)
            | StoreError::BaseRemoved(_)
            | StoreError::UnknownNamespace(_)
            | StoreError::ObjectNotFound(_) => Error::NotFound(e.to_string()),
            StoreError::NamespaceConflict(_) | StoreError::HookRejected { .. } => {
                Error::Conflict(e.to_string())
            }
            StoreError::Config(msg) => Error::Config(msg),
            StoreError::NotPersistent => Error::Misuse(e.to_string()),
            StoreError::Journal(j) => j.into(),
            StoreError::Io(io) => Error::Io(io),
            other => Error::Internal(other.to_string()),
        }
    }
}

impl From<QueryError> for Error {
    fn from(e: QueryError) -> Self {
        Error::InvalidQuery(e.to_string())
    }
}
