//! Exclusive schema changes
//!
//! A [`SchemaEdit`] is held while no lock exists anywhere in the store.
//! Bases and namespaces can be added or removed and hooks swapped; every
//! lock request waits until the edit is finished.

use crate::error::{Result, StoreError};
use crate::hooks::ObjectHook;
use crate::store::Store;
use dirstore_concurrency::SchemaGuard;
use dirstore_core::{BaseDef, BaseId, NamespaceDef};
use std::sync::Arc;
use tracing::info;

/// Exclusive access to the store's schema
#[derive(Debug)]
pub struct SchemaEdit<'a> {
    store: &'a Store,
    _guard: SchemaGuard,
}

impl<'a> SchemaEdit<'a> {
    pub(crate) fn new(store: &'a Store, guard: SchemaGuard) -> Self {
        Self {
            store,
            _guard: guard,
        }
    }

    /// Register a new base
    ///
    /// Every namespace its fields name must already exist.
    pub fn add_base(&self, def: BaseDef) -> Result<()> {
        if let Some(ns) = def
            .fields
            .iter()
            .filter_map(|f| f.namespace.as_deref())
            .find(|ns| !self.store.namespaces().contains(ns))
        {
            return Err(StoreError::UnknownNamespace(ns.to_string()));
        }
        let base = self.store.bases().add(def)?;
        info!(base = base.type_id().0, name = base.name(), "Base added");
        Ok(())
    }

    /// Remove an empty base, unregistering its hook
    pub fn remove_base(&self, id: BaseId) -> Result<BaseDef> {
        let base = self.store.bases().remove(id)?;
        self.store.hooks().unregister(id);
        info!(base = id.0, "Base removed");
        Ok(base.def().clone())
    }

    /// Register a new namespace
    pub fn add_namespace(&self, def: &NamespaceDef) -> Result<()> {
        self.store.namespaces().add(def)?;
        info!(namespace = %def.name, "Namespace added");
        Ok(())
    }

    /// Install `hook` for `base`, returning the previous one
    pub fn swap_hook(&self, base: BaseId, hook: Arc<dyn ObjectHook>) -> Result<Option<Arc<dyn ObjectHook>>> {
        if !self.store.bases().contains(base) {
            return Err(StoreError::UnknownBase(base));
        }
        Ok(self.store.hooks().register(base, hook))
    }

    /// End the edit, letting waiting locks proceed
    pub fn finish(self) {}
}
