//! Transactional store engine for dirstore
//!
//! This crate ties the lower layers together into a usable store:
//! - Store / StoreBuilder: open, recover, dump and close
//! - Session: locks, transactions, checkpoints and commit
//! - EditSet / ShadowObject: a transaction's working copies
//! - ObjectHook: per-type commit validation and labels
//! - SchemaEdit: exclusive base and namespace changes
//!
//! ```ignore
//! let store = Store::builder().path("./data").base(users).open()?;
//! let mut session = store.session("admin");
//! session.open_transaction()?;
//! session.create_object(BaseId(3))?.set("username", "alice")?;
//! session.commit()?;
//! store.close()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod editset;
pub mod error;
pub mod hooks;
pub mod schema_edit;
pub mod session;
pub mod shadow;
pub mod store;

pub use config::{StoreConfig, DEFAULT_DUMP_FILE, DEFAULT_JOURNAL_FILE};
pub use editset::EditSet;
pub use error::{Result, StoreError};
pub use hooks::{DefaultHook, HookRegistry, ObjectHook};
pub use schema_edit::SchemaEdit;
pub use session::{AbortHandle, Checkout, CommitSummary, ObjectRef, Session};
pub use shadow::{ShadowObject, ShadowStatus};
pub use store::{RecoverySummary, Store, StoreBuilder};
