//! Core types for dirstore
//!
//! This crate defines the vocabulary shared by every other layer:
//! - Identifiers: [`BaseId`], [`ObjectId`], [`FieldId`], [`Invid`], [`SessionKey`]
//! - Values: [`Value`] and [`FieldValue`]
//! - Schema: [`FieldType`], [`FieldDef`], [`BaseDef`], [`NamespaceDef`] and the
//!   reserved [`builtin`] field ids
//! - Objects: [`StoredObject`]
//!
//! Objects refer to each other only through Invids; nothing here holds a
//! pointer into another object.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod object;
pub mod schema;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use object::StoredObject;
pub use schema::{builtin, BaseDef, FieldDef, FieldType, NamespaceDef};
pub use types::{BaseId, FieldId, Invid, ObjectId, SessionKey};
pub use value::{
    modified_utf8_len, FieldValue, Value, MAX_IP_OCTETS, MAX_STRING_BYTES, MAX_VECTOR_LEN,
};
