//! # dirstore
//!
//! Transactional, journaled object store for directory-management servers.
//!
//! Objects live in typed bases and are addressed by [`Invid`]s. Clients
//! work through sessions: take a lock, open a transaction, edit shadow
//! copies, and commit. A commit is checked against unique-value
//! namespaces and per-type hooks, written to the journal as one frame,
//! and only then installed in the live bases.
//!
//! ## Quick Start
//!
//! ```ignore
//! use dirstore::prelude::*;
//!
//! let users = BaseDef::new(BaseId(3), "User")
//!     .with_field(FieldDef::scalar(100, "username", FieldType::String).unique_in("usernames"))?
//!     .with_label("username")?;
//!
//! let store = Store::builder()
//!     .path("./data")
//!     .namespace(NamespaceDef::case_insensitive("usernames"))
//!     .base(users)
//!     .open()?;
//!
//! let mut session = store.session("admin");
//! session.open_transaction()?;
//! session.create_object(BaseId(3))?.set("username", "alice")?;
//! session.commit()?;
//!
//! store.close()?;
//! ```
//!
//! ## Crates
//!
//! | Crate | Role |
//! |-------|------|
//! | `dirstore-core` | Ids, values, schema, stored objects |
//! | `dirstore-storage` | Live bases, check-outs, namespaces |
//! | `dirstore-concurrency` | Read, write and dump locks |
//! | `dirstore-durability` | Journal and dump files |
//! | `dirstore-query` | Query predicates |
//! | `dirstore-engine` | Store, sessions, transactions |

#![warn(missing_docs)]

mod error;

pub mod prelude;

// Re-export main entry points
pub use dirstore_engine::{
    AbortHandle, Checkout, CommitSummary, DefaultHook, EditSet, HookRegistry, ObjectHook,
    ObjectRef, RecoverySummary, SchemaEdit, Session, ShadowObject, ShadowStatus, Store,
    StoreBuilder, StoreConfig, StoreError,
};
pub use error::{Error, Result};

// Re-export types
pub use dirstore_concurrency::LockKind;
pub use dirstore_core::{
    builtin, BaseDef, BaseId, FieldDef, FieldId, FieldType, FieldValue, Invid, NamespaceDef,
    ObjectId, SessionKey, StoredObject, Value,
};
pub use dirstore_durability::DurabilityMode;
pub use dirstore_query::{
    matches, validate, ArrayOp, Comparator, DataNode, FieldSelector, Query, QueryContext,
    QueryError, QueryNode,
};
