//! Durability layer for dirstore
//!
//! This crate makes committed transactions survive a crash:
//! - codec: big-endian integers and modified UTF-8 strings
//! - encoding: object encoding shared by journal and dump
//! - Journal: append-only transaction log with crash-tolerant replay
//! - dump: full-store snapshot file written at checkpoints
//! - DurabilityMode: None, Buffered, Strict

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod dump;
pub mod encoding;
pub mod error;
pub mod journal;
pub mod mode;

pub use dump::{load_dump, read_dump, write_dump, DumpImage, DumpedBase};
pub use error::{JournalError, Result};
pub use journal::{
    scan_bytes, scan_file, FileSink, Journal, JournalFrame, JournalHeader, JournalOp,
    JournalRecord, JournalScan, JournalSink, LoadSummary, RecordRef,
};
pub use mode::DurabilityMode;
