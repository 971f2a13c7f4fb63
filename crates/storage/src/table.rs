//! The store-wide table of object bases

use crate::base::ObjectBase;
use crate::error::{Result, StorageError};
use dirstore_core::{BaseDef, BaseId, Invid, StoredObject};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// All object bases, keyed by base id
///
/// Invids are resolved through this table. Bases are only added or
/// removed during schema loading or a schema edit.
#[derive(Debug, Default)]
pub struct BaseTable {
    bases: RwLock<BTreeMap<BaseId, Arc<ObjectBase>>>,
}

impl BaseTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding an empty base for each definition
    pub fn from_defs(defs: impl IntoIterator<Item = BaseDef>) -> Result<Self> {
        let table = Self::new();
        for def in defs {
            table.add(def)?;
        }
        Ok(table)
    }

    /// Register a new, empty base
    pub fn add(&self, def: BaseDef) -> Result<Arc<ObjectBase>> {
        let mut bases = self.bases.write();
        if bases.contains_key(&def.type_id) {
            return Err(StorageError::BaseExists(def.type_id));
        }
        debug!(base = def.type_id.0, name = %def.name, "Registering object base");
        let base = Arc::new(ObjectBase::new(def));
        bases.insert(base.type_id(), Arc::clone(&base));
        Ok(base)
    }

    /// Remove a base that has no objects and no check-outs
    pub fn remove(&self, id: BaseId) -> Result<Arc<ObjectBase>> {
        let mut bases = self.bases.write();
        let base = bases.get(&id).ok_or(StorageError::UnknownBase(id))?;
        let objects = base.len();
        let checkouts = base.checkout_count();
        if objects > 0 || checkouts > 0 {
            return Err(StorageError::BaseInUse {
                base: id,
                objects,
                checkouts,
            });
        }
        debug!(base = id.0, "Removing object base");
        bases.remove(&id).ok_or(StorageError::UnknownBase(id))
    }

    /// Look up a base
    pub fn get(&self, id: BaseId) -> Option<Arc<ObjectBase>> {
        self.bases.read().get(&id).cloned()
    }

    /// Look up a base, failing if it is unknown
    pub fn require(&self, id: BaseId) -> Result<Arc<ObjectBase>> {
        self.get(id).ok_or(StorageError::UnknownBase(id))
    }

    /// Whether a base is registered
    pub fn contains(&self, id: BaseId) -> bool {
        self.bases.read().contains_key(&id)
    }

    /// Registered base ids in ascending order
    pub fn ids(&self) -> Vec<BaseId> {
        self.bases.read().keys().copied().collect()
    }

    /// All bases in ascending id order
    pub fn all(&self) -> Vec<Arc<ObjectBase>> {
        self.bases.read().values().cloned().collect()
    }

    /// Number of registered bases
    pub fn len(&self) -> usize {
        self.bases.read().len()
    }

    /// Whether no base is registered
    pub fn is_empty(&self) -> bool {
        self.bases.read().is_empty()
    }

    /// Resolve an Invid to its live object
    pub fn resolve(&self, invid: Invid) -> Option<Arc<StoredObject>> {
        self.get(invid.base())?.get(invid.id())
    }

    /// Total live objects across all bases
    pub fn object_count(&self) -> usize {
        self.bases.read().values().map(|b| b.len()).sum()
    }
}
