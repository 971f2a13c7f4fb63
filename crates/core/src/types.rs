//! Core identifier types for the object store
//!
//! This module defines the fundamental identifiers used throughout the system:
//! - [`BaseId`]: Identifies one object type (one object base)
//! - [`ObjectId`]: Identifies an object within its base
//! - [`Invid`]: The permanent (base, object) pair naming an object store-wide
//! - [`FieldId`]: Identifies a field within a base's schema
//! - [`SessionKey`]: Identifies the session owning locks and check-outs

use serde::{Deserialize, Serialize};

/// Identifier of an object base (one object type)
///
/// Encoded on disk as a signed 16-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaseId(pub i16);

impl std::fmt::Display for BaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an object within its base
///
/// Ids are allocated from the base's `maxId` counter and never reused
/// once an object carrying them has been committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub i32);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a field within a base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub i16);

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Invariant object identifier
///
/// An Invid names one object uniquely and permanently: the pair of its
/// base and its id within that base. Objects refer to each other only
/// through Invids, which are resolved through the store's base table.
///
/// # Examples
///
/// ```
/// use dirstore_core::types::{BaseId, Invid, ObjectId};
///
/// let invid = Invid::new(BaseId(3), ObjectId(5));
/// assert_eq!(invid.base(), BaseId(3));
/// assert_eq!(invid.to_string(), "3:5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Invid {
    base: BaseId,
    id: ObjectId,
}

impl Invid {
    /// Create an Invid from its base and object id
    pub const fn new(base: BaseId, id: ObjectId) -> Self {
        Invid { base, id }
    }

    /// The base (object type) this Invid belongs to
    pub const fn base(&self) -> BaseId {
        self.base
    }

    /// The object id within the base
    pub const fn id(&self) -> ObjectId {
        self.id
    }
}

impl std::fmt::Display for Invid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.base.0, self.id.0)
    }
}

/// Key identifying the owner of locks and object check-outs
///
/// Each session is assigned a distinct key by the store. A key may hold at
/// most one lock at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(pub u64);

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}
