//! Convenient imports for dirstore.
//!
//! This module re-exports the most commonly used types so you can get started
//! with a single import:
//!
//! ```ignore
//! use dirstore::prelude::*;
//!
//! let store = Store::builder().path("./data").base(users).open()?;
//! let mut session = store.session("admin");
//! ```

// Main entry point
pub use dirstore_engine::{Session, Store, StoreBuilder, StoreConfig};

// Error handling
pub use crate::error::{Error, Result};

// Transactions
pub use dirstore_engine::{Checkout, CommitSummary, ObjectHook, ObjectRef, ShadowObject, ShadowStatus};

// Core types
pub use dirstore_core::{
    builtin, BaseDef, BaseId, FieldDef, FieldId, FieldType, FieldValue, Invid, NamespaceDef,
    ObjectId, StoredObject, Value,
};

// Locks
pub use dirstore_concurrency::LockKind;

// Queries
pub use dirstore_query::{ArrayOp, Comparator, DataNode, FieldSelector, Query, QueryNode};

// Durability
pub use dirstore_durability::DurabilityMode;
