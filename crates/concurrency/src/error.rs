//! Lock manager errors

use dirstore_core::{BaseId, SessionKey};
use thiserror::Error;

/// Errors raised while establishing or using a lock
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The lock was aborted, either while waiting or before establishing
    #[error("lock establish cancelled")]
    Cancelled,

    /// The session key already owns a lock
    #[error("{0} already holds a lock")]
    KeyInUse(SessionKey),

    /// `establish` called on a lock that is established or establishing
    #[error("lock is already established")]
    AlreadyEstablished,

    /// `establish` called on a lock that has been released
    #[error("lock has been released")]
    Released,

    /// Lock requested on a base the store does not know
    #[error("unknown base {0}")]
    UnknownBase(BaseId),
}

impl LockError {
    /// Whether this is the cancellation signal rather than misuse
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LockError::Cancelled)
    }
}

/// Result type for lock operations
pub type Result<T> = std::result::Result<T, LockError>;
