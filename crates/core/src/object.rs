//! Stored objects
//!
//! A [`StoredObject`] is a record of field values plus its permanent
//! [`Invid`]. Live objects are never mutated in place: the store hands out
//! shared, immutable copies, and edits happen on a transaction-local clone
//! that replaces the live object wholesale at commit.

use crate::error::{Error, Result};
use crate::schema::{BaseDef, FieldDef};
use crate::types::{FieldId, Invid};
use crate::value::{FieldValue, Value, MAX_VECTOR_LEN};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A record of field values identified by its Invid
///
/// Fields are kept ordered by id so that encodings are deterministic.
/// Undefined fields are simply absent; setting an empty vector removes
/// the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    invid: Invid,
    fields: BTreeMap<FieldId, FieldValue>,
}

impl StoredObject {
    /// Create an object with no fields defined
    pub fn new(invid: Invid) -> Self {
        StoredObject {
            invid,
            fields: BTreeMap::new(),
        }
    }

    /// Rebuild an object from already-validated field values
    ///
    /// Used by decoders; no schema check is performed.
    pub fn from_fields(invid: Invid, fields: BTreeMap<FieldId, FieldValue>) -> Self {
        StoredObject { invid, fields }
    }

    /// The object's permanent identifier
    pub fn invid(&self) -> Invid {
        self.invid
    }

    /// Value of a field, if defined
    pub fn get(&self, field: FieldId) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    /// Scalar value of a field, if defined and scalar
    pub fn get_scalar(&self, field: FieldId) -> Option<&Value> {
        self.fields.get(&field).and_then(FieldValue::as_scalar)
    }

    /// Whether the field holds any data
    pub fn is_defined(&self, field: FieldId) -> bool {
        self.fields.get(&field).map_or(false, FieldValue::is_defined)
    }

    /// All defined fields in id order
    pub fn fields(&self) -> impl Iterator<Item = (FieldId, &FieldValue)> {
        self.fields.iter().map(|(id, v)| (*id, v))
    }

    /// Number of defined fields
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Assign a field, checking the value against its definition
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the value's shape (scalar or
    /// vector) or element type disagrees with `def`, and
    /// [`Error::ValueTooLong`] if it could not be written to disk.
    pub fn set_field(&mut self, def: &FieldDef, value: FieldValue) -> Result<()> {
        let shape_ok = def.array == value.is_vector();
        let bad_element = value.values().find(|v| v.field_type() != def.field_type);
        if !shape_ok || bad_element.is_some() {
            let actual = match (&value, bad_element) {
                (_, Some(v)) => v.type_name().to_string(),
                (FieldValue::Vector(_), None) => "vector".to_string(),
                (FieldValue::Scalar(v), None) => v.type_name().to_string(),
            };
            return Err(Error::TypeMismatch {
                field: def.id,
                expected: def.field_type,
                array: def.array,
                actual,
            });
        }
        if let FieldValue::Vector(elements) = &value {
            if elements.len() > MAX_VECTOR_LEN {
                return Err(Error::ValueTooLong {
                    field: def.id,
                    what: "vector elements",
                    len: elements.len(),
                    max: MAX_VECTOR_LEN,
                });
            }
        }
        if let Some((what, len, max)) = value.values().find_map(Value::oversize) {
            return Err(Error::ValueTooLong {
                field: def.id,
                what,
                len,
                max,
            });
        }

        if value.is_defined() {
            self.fields.insert(def.id, value);
        } else {
            self.fields.remove(&def.id);
        }
        Ok(())
    }

    /// Assign a scalar field
    pub fn set(&mut self, def: &FieldDef, value: impl Into<Value>) -> Result<()> {
        self.set_field(def, FieldValue::Scalar(value.into()))
    }

    /// Append an element to a vector field
    pub fn push(&mut self, def: &FieldDef, value: impl Into<Value>) -> Result<()> {
        let mut elements = self
            .fields
            .get(&def.id)
            .and_then(FieldValue::as_vector)
            .map(<[Value]>::to_vec)
            .unwrap_or_default();
        elements.push(value.into());
        self.set_field(def, FieldValue::Vector(elements))
    }

    /// Assign a field without consulting a definition
    ///
    /// Reserved for store bookkeeping on built-in fields whose types are
    /// fixed.
    pub fn set_unchecked(&mut self, field: FieldId, value: FieldValue) {
        if value.is_defined() {
            self.fields.insert(field, value);
        } else {
            self.fields.remove(&field);
        }
    }

    /// Undefine a field, returning its previous value
    pub fn clear(&mut self, field: FieldId) -> Option<FieldValue> {
        self.fields.remove(&field)
    }

    /// Default label of the object under `base`
    ///
    /// The value of the base's label field, when one is declared and set.
    pub fn label(&self, base: &BaseDef) -> Option<String> {
        let field = base.label_field?;
        match self.fields.get(&field)? {
            FieldValue::Scalar(v) => Some(v.to_string()),
            FieldValue::Vector(values) => Some(
                values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        }
    }
}
