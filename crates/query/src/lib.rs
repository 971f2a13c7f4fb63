//! Query predicates for dirstore objects
//!
//! A query is a boolean tree over per-field comparisons. Evaluation is a
//! pure function of the tree and one object, so callers drive the scan
//! themselves while holding whatever lock they need:
//!
//! ```
//! use dirstore_core::{BaseDef, BaseId, FieldDef, FieldType, Invid, ObjectId, StoredObject};
//! use dirstore_query::{matches, Comparator, DataNode, FieldSelector, Query, QueryNode};
//!
//! let users = BaseDef::new(BaseId(3), "User")
//!     .with_field(FieldDef::scalar(100, "name", FieldType::String))
//!     .unwrap();
//! let mut alice = StoredObject::new(Invid::new(BaseId(3), ObjectId(1)));
//! alice.set(users.field_by_name("name").unwrap(), "Alice").unwrap();
//!
//! let query = Query::new(
//!     BaseId(3),
//!     QueryNode::data(DataNode::new(
//!         FieldSelector::Name("name".into()),
//!         Comparator::NoCaseEquals,
//!         "alice",
//!     )),
//! );
//! assert!(matches(&users, &query, &alice));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod eval;
pub mod node;
pub mod validate;

pub use error::{QueryError, Result};
pub use eval::{matches, matches_node, QueryContext};
pub use node::{ArrayOp, Comparator, DataNode, FieldSelector, Query, QueryNode};
pub use validate::validate;
