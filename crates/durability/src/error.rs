//! Journal and dump errors

use dirstore_core::BaseId;
use thiserror::Error;

/// Errors raised while reading or writing the journal or a dump
#[derive(Debug, Error)]
pub enum JournalError {
    /// Underlying file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File does not start with the expected magic string
    #[error("bad magic: expected '{expected}', found '{found}'")]
    BadMagic {
        /// Magic string this reader understands
        expected: &'static str,
        /// Magic string found in the file
        found: String,
    },

    /// File was written by an incompatible format version
    #[error("unsupported format version {major}.{minor}")]
    VersionMismatch {
        /// Major version found
        major: i16,
        /// Minor version found
        minor: i16,
    },

    /// A record names a base the store does not know
    #[error("record references unknown base {0}")]
    UnknownBase(BaseId),

    /// Malformed content where a well-formed value was required
    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// A string too long for its u16 length prefix
    #[error("string of {0} encoded bytes exceeds the 65535 byte limit")]
    StringTooLong(usize),

    /// A failed frame could not be removed from the journal file
    #[error("journal is poisoned; dump the store to start a fresh journal")]
    Poisoned,
}

impl JournalError {
    /// Whether the error is a short read at end of input
    pub fn is_eof(&self) -> bool {
        matches!(self, JournalError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

/// Result type for durability operations
pub type Result<T> = std::result::Result<T, JournalError>;
