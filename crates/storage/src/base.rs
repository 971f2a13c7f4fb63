//! Object base: the live object table for one object type
//!
//! # Design
//!
//! - Live map: `FxHashMap<ObjectId, Arc<StoredObject>>` behind a
//!   `parking_lot::RwLock`. Objects are shared immutably; installing an
//!   edit replaces the `Arc` wholesale.
//! - `maxId`: an `AtomicI32` that only advances, except when the most
//!   recently allocated id is handed back before being committed.
//! - Check-outs: `DashMap<ObjectId, SessionKey>` recording which session
//!   holds each object for editing. Claiming never blocks.
//!
//! The map's physical lock only guards memory. Logical isolation between
//! sessions comes from the store's read/write/dump locks, which callers
//! must hold before touching a base.

use crate::namespace::NamespaceTable;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dirstore_core::{BaseDef, BaseId, Invid, ObjectId, SessionKey, StoredObject};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// The live object table for one object type
#[derive(Debug)]
pub struct ObjectBase {
    def: BaseDef,
    objects: RwLock<FxHashMap<ObjectId, Arc<StoredObject>>>,
    max_id: AtomicI32,
    checkouts: DashMap<ObjectId, SessionKey>,
}

impl ObjectBase {
    /// Create an empty base for `def`
    pub fn new(def: BaseDef) -> Self {
        Self {
            def,
            objects: RwLock::new(FxHashMap::default()),
            max_id: AtomicI32::new(0),
            checkouts: DashMap::new(),
        }
    }

    /// Schema definition of this base
    pub fn def(&self) -> &BaseDef {
        &self.def
    }

    /// Base id
    #[inline]
    pub fn type_id(&self) -> BaseId {
        self.def.type_id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.def.name
    }

    // ========================================================================
    // Live map
    // ========================================================================

    /// Fetch a live object
    pub fn get(&self, id: ObjectId) -> Option<Arc<StoredObject>> {
        self.objects.read().get(&id).cloned()
    }

    /// Whether a live object with this id exists
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.read().contains_key(&id)
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the base holds no live objects
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// All live objects, sorted by id
    ///
    /// Returns shared handles, so the scan does not hold the map lock.
    pub fn objects(&self) -> Vec<Arc<StoredObject>> {
        let mut all: Vec<_> = self.objects.read().values().cloned().collect();
        all.sort_by_key(|obj| obj.invid().id());
        all
    }

    /// Install an object, replacing any previous version
    ///
    /// Advances `maxId` to the object's id if it is higher. Returns the
    /// replaced object.
    pub fn install(&self, object: StoredObject) -> Option<Arc<StoredObject>> {
        let id = object.invid().id();
        self.max_id.fetch_max(id.0, Ordering::AcqRel);
        self.objects.write().insert(id, Arc::new(object))
    }

    /// Remove a live object, returning it
    pub fn remove(&self, id: ObjectId) -> Option<Arc<StoredObject>> {
        self.objects.write().remove(&id)
    }

    /// Install an object and move its namespace reservations over
    ///
    /// Values held by the replaced version are released before the new
    /// version's values are reserved.
    pub fn install_with(
        &self,
        namespaces: &NamespaceTable,
        object: StoredObject,
    ) -> Option<Arc<StoredObject>> {
        if let Some(old) = self.get(object.invid().id()) {
            namespaces.release_object(&self.def, &old);
        }
        namespaces.reserve_object(&self.def, &object);
        self.install(object)
    }

    /// Remove an object and release its namespace reservations
    pub fn remove_with(
        &self,
        namespaces: &NamespaceTable,
        id: ObjectId,
    ) -> Option<Arc<StoredObject>> {
        let removed = self.remove(id)?;
        namespaces.release_object(&self.def, &removed);
        Some(removed)
    }

    // ========================================================================
    // Id allocation
    // ========================================================================

    /// Highest id issued so far
    #[inline]
    pub fn max_id(&self) -> ObjectId {
        ObjectId(self.max_id.load(Ordering::Acquire))
    }

    /// Restore `maxId` from a dump
    ///
    /// Never lowers the counter.
    pub fn restore_max_id(&self, id: ObjectId) {
        self.max_id.fetch_max(id.0, Ordering::AcqRel);
    }

    /// Allocate the next object id
    pub fn next_id(&self) -> ObjectId {
        ObjectId(self.max_id.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Hand back an allocated id that was never committed
    ///
    /// Only the most recent allocation can be returned; any other id stays
    /// retired. Returns whether the counter was lowered.
    pub fn release_id(&self, id: ObjectId) -> bool {
        self.max_id
            .compare_exchange(id.0, id.0 - 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    // ========================================================================
    // Check-outs
    // ========================================================================

    /// Claim an object for editing by `key`
    ///
    /// Succeeds if the object is free or already held by `key`. Otherwise
    /// returns the holding session without blocking.
    pub fn check_out(&self, id: ObjectId, key: SessionKey) -> Result<(), SessionKey> {
        match self.checkouts.entry(id) {
            Entry::Occupied(entry) if *entry.get() == key => Ok(()),
            Entry::Occupied(entry) => Err(*entry.get()),
            Entry::Vacant(entry) => {
                entry.insert(key);
                Ok(())
            }
        }
    }

    /// Release a claim held by `key`
    ///
    /// Claims held by other sessions are left alone.
    pub fn check_in(&self, id: ObjectId, key: SessionKey) -> bool {
        self.checkouts
            .remove_if(&id, |_, holder| *holder == key)
            .is_some()
    }

    /// Session currently holding an object, if any
    pub fn holder(&self, id: ObjectId) -> Option<SessionKey> {
        self.checkouts.get(&id).map(|entry| *entry.value())
    }

    /// Number of objects currently checked out
    pub fn checkout_count(&self) -> usize {
        self.checkouts.len()
    }

    /// Invid of an object in this base
    pub fn invid(&self, id: ObjectId) -> Invid {
        Invid::new(self.type_id(), id)
    }
}
