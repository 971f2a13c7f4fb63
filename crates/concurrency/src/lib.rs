//! Lock manager for dirstore
//!
//! This crate coordinates access to object bases with three lock classes
//! sharing one store-wide monitor:
//! - StoreState: the monitor (mutex + condvar), base table and lock table
//! - Lock: a read, write or dump lock over a fixed set of bases
//! - SchemaGuard: store-wide exclusivity for schema edits
//!
//! Cancellation is explicit: [`Lock::abort`] is the only way to unblock a
//! waiting `establish`. There are no timeouts.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod lock;
pub mod state;

pub use error::{LockError, Result};
pub use lock::{Lock, LockKind};
pub use state::{LockId, LockPhase, QueueSnapshot, SchemaGuard, StoreState};
