//! Storage layer for dirstore
//!
//! This crate holds the in-memory state of a store:
//! - ObjectBase: live object map, `maxId` counter and check-out registry
//!   for one object type
//! - BaseTable: all bases keyed by id, used to resolve Invids
//! - NamespaceTable: unique-value reservations shared across bases
//!
//! Nothing here decides who may touch what; callers hold the appropriate
//! store lock before reading or installing objects.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod base;
pub mod error;
pub mod namespace;
pub mod table;

pub use base::ObjectBase;
pub use error::{Result, StorageError};
pub use namespace::{Conflict, Holder, NamespaceChange, NamespaceTable};
pub use table::BaseTable;
