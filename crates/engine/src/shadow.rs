//! Transaction-local working copies of objects

use crate::error::{Result, StoreError};
use dirstore_core::{BaseDef, BaseId, FieldDef, FieldId, FieldValue, Invid, StoredObject, Value};
use dirstore_storage::ObjectBase;
use std::sync::Arc;

/// What commit will do with a shadow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowStatus {
    /// New object; installed on commit
    Creating,
    /// Copy of a live object; replaces it on commit
    Editing,
    /// Live object marked for removal
    Deleting,
    /// Created then deleted in the same transaction; commit ignores it
    Dropping,
}

impl std::fmt::Display for ShadowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShadowStatus::Creating => write!(f, "creating"),
            ShadowStatus::Editing => write!(f, "editing"),
            ShadowStatus::Deleting => write!(f, "deleting"),
            ShadowStatus::Dropping => write!(f, "dropping"),
        }
    }
}

/// A working copy owned by one transaction
///
/// Field setters check values against the base's schema. Objects marked
/// for deletion refuse further changes.
#[derive(Debug, Clone)]
pub struct ShadowObject {
    base: Arc<ObjectBase>,
    status: ShadowStatus,
    object: StoredObject,
}

impl ShadowObject {
    pub(crate) fn creating(base: Arc<ObjectBase>, invid: Invid) -> Self {
        Self {
            base,
            status: ShadowStatus::Creating,
            object: StoredObject::new(invid),
        }
    }

    pub(crate) fn editing(base: Arc<ObjectBase>, live: &StoredObject) -> Self {
        Self {
            base,
            status: ShadowStatus::Editing,
            object: live.clone(),
        }
    }

    /// Object identity
    pub fn invid(&self) -> Invid {
        self.object.invid()
    }

    /// Base the object belongs to
    pub fn base_id(&self) -> BaseId {
        self.base.type_id()
    }

    /// Schema of the object's base
    pub fn def(&self) -> &BaseDef {
        self.base.def()
    }

    pub(crate) fn base(&self) -> &Arc<ObjectBase> {
        &self.base
    }

    /// Current status
    pub fn status(&self) -> ShadowStatus {
        self.status
    }

    /// Whether commit will remove or discard this object
    pub fn is_deleted(&self) -> bool {
        matches!(self.status, ShadowStatus::Deleting | ShadowStatus::Dropping)
    }

    /// The working copy
    pub fn object(&self) -> &StoredObject {
        &self.object
    }

    pub(crate) fn object_mut(&mut self) -> &mut StoredObject {
        &mut self.object
    }

    /// Mark for deletion
    ///
    /// Creating becomes dropping, editing becomes deleting; already deleted
    /// shadows are left alone.
    pub(crate) fn mark_deleted(&mut self) {
        self.status = match self.status {
            ShadowStatus::Creating => ShadowStatus::Dropping,
            ShadowStatus::Editing => ShadowStatus::Deleting,
            other => other,
        };
    }

    // ========================================================================
    // Field access
    // ========================================================================

    /// Field value by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        let def = self.def().field_by_name(name)?;
        self.object.get(def.id)
    }

    /// Scalar field value by name
    pub fn get_scalar(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(FieldValue::as_scalar)
    }

    /// Set a scalar field by name
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let def = self.field_def(name)?;
        self.writable()?;
        self.object.set(&def, value)?;
        Ok(())
    }

    /// Append to a vector field by name
    pub fn push(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let def = self.field_def(name)?;
        self.writable()?;
        self.object.push(&def, value)?;
        Ok(())
    }

    /// Set a field by id
    pub fn set_field(&mut self, field: FieldId, value: FieldValue) -> Result<()> {
        let def = self
            .def()
            .field(field)
            .cloned()
            .ok_or(dirstore_core::Error::UnknownField {
                base: self.base_id(),
                field,
            })?;
        self.writable()?;
        self.object.set_field(&def, value)?;
        Ok(())
    }

    /// Undefine a field by name, returning the old value
    pub fn clear(&mut self, name: &str) -> Result<Option<FieldValue>> {
        let def = self.field_def(name)?;
        self.writable()?;
        Ok(self.object.clear(def.id))
    }

    fn field_def(&self, name: &str) -> Result<FieldDef> {
        self.def().field_by_name(name).cloned().ok_or_else(|| {
            StoreError::Schema(dirstore_core::Error::UnknownFieldName {
                base: self.base_id(),
                name: name.to_string(),
            })
        })
    }

    fn writable(&self) -> Result<()> {
        if self.is_deleted() {
            Err(StoreError::ObjectDeleted(self.invid()))
        } else {
            Ok(())
        }
    }
}
