//! Engine errors
//!
//! | Class | Variants | Caller response |
//! |-------|----------|-----------------|
//! | Misuse | `NoTransaction`, `TransactionOpen`, `LockNotHeld`, `LockHeld`, `ObjectDeleted`, `Schema` | Fix the calling code |
//! | Cancellation | `Lock(LockError::Cancelled)` | Unwind; the lock was aborted |
//! | Durability | `Journal`, `Io` | The operation did not happen |
//! | Validation | `NamespaceConflict`, `HookRejected` | Change the transaction and retry the commit |
//! | Schema change | `BaseRemoved` | Abort the transaction |
//!
//! Contention on an object is not an error: see
//! [`Checkout::Unavailable`](crate::Checkout::Unavailable).

use dirstore_concurrency::{LockError, LockKind};
use dirstore_core::{BaseId, Invid};
use dirstore_durability::JournalError;
use dirstore_storage::{Conflict, StorageError};
use thiserror::Error;

/// Errors raised by the store and its sessions
#[derive(Debug, Error)]
pub enum StoreError {
    /// Operation requires an open transaction
    #[error("no transaction is open")]
    NoTransaction,

    /// `open_transaction` called while one is open
    #[error("a transaction is already open")]
    TransactionOpen,

    /// Live object access without a lock covering its base
    #[error("no lock held on base {0}")]
    LockNotHeld(BaseId),

    /// The session already holds a lock of this kind
    #[error("session already holds a {0} lock")]
    LockHeld(LockKind),

    /// Base id not registered
    #[error("unknown base {0}")]
    UnknownBase(BaseId),

    /// A base the transaction touches was removed by a schema edit after
    /// the transaction staged objects in it
    #[error("base {0} was removed while the transaction was open")]
    BaseRemoved(BaseId),

    /// Namespace referenced by a field is not registered
    #[error("unknown namespace '{0}'")]
    UnknownNamespace(String),

    /// Object not present in its base
    #[error("object {0} not found")]
    ObjectNotFound(Invid),

    /// Field change on an object marked for deletion
    #[error("object {0} is marked for deletion")]
    ObjectDeleted(Invid),

    /// Operation needs an on-disk store
    #[error("store has no data directory")]
    NotPersistent,

    /// Commit would give a unique value to a second object
    #[error("namespace conflict: {0}")]
    NamespaceConflict(Conflict),

    /// A per-type hook vetoed the commit
    #[error("commit of {invid} rejected: {reason}")]
    HookRejected {
        /// Object whose hook refused
        invid: Invid,
        /// Reason given by the hook
        reason: String,
    },

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),

    /// Schema or field misuse
    #[error(transparent)]
    Schema(#[from] dirstore_core::Error),

    /// Base or namespace table error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Lock establish failed or was cancelled
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Journal or dump failure
    #[error(transparent)]
    Journal(#[from] JournalError),

    /// File system failure outside the journal
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the error reports incorrect use of the API
    pub fn is_misuse(&self) -> bool {
        match self {
            StoreError::NoTransaction
            | StoreError::TransactionOpen
            | StoreError::LockNotHeld(_)
            | StoreError::LockHeld(_)
            | StoreError::ObjectDeleted(_)
            | StoreError::Schema(_) => true,
            StoreError::Lock(e) => !e.is_cancelled(),
            _ => false,
        }
    }

    /// Whether a lock wait was cancelled by `abort`
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StoreError::Lock(e) if e.is_cancelled())
    }

    /// Whether the journal, a dump or the file system failed
    pub fn is_durability(&self) -> bool {
        matches!(self, StoreError::Journal(_) | StoreError::Io(_))
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, StoreError>;
