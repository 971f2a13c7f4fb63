//! Sessions and transactions
//!
//! A [`Session`] is one client's view of the store. It holds at most one
//! lock and at most one open transaction.
//!
//! | Operation | Needs | Effect |
//! |-----------|-------|--------|
//! | `open_read_lock` / `open_write_lock` / `open_dump_lock` | no lock held | Blocks until granted |
//! | `view_object` | lock covering the base (or a shadow) | Live or shadow copy |
//! | `open_transaction` | no open transaction | Empty edit set |
//! | `create_object` | transaction | New shadow, fresh id |
//! | `edit_object` / `delete_object` | transaction + lock | Checked-out shadow |
//! | `checkpoint` / `rollback` / `pop_checkpoint` | transaction | Edit set stack |
//! | `commit` | transaction | Validate, journal, install |
//! | `abort` | transaction | Discard shadows |
//!
//! # Commit
//!
//! ```text
//! 1. drop a read/dump lock; take a write lock on the touched bases
//! 2. every shadow's base is still the registered one; namespace check
//! 3. per-type hooks, phase 1 (may veto)
//! 4. stamp modification / creation bookkeeping
//! 5. journal the transaction as one frame
//! 6. install shadows into the live bases, check objects back in
//! 7. release the commit's write lock
//! 8. per-type hooks, phase 2
//! ```
//!
//! A failure in steps 2-5 leaves the transaction open and the live bases
//! untouched. Dropping a session aborts its transaction and releases its
//! lock.

use crate::editset::EditSet;
use crate::error::{Result, StoreError};
use crate::shadow::{ShadowObject, ShadowStatus};
use crate::store::Store;
use chrono::{DateTime, Utc};
use dirstore_concurrency::{Lock, LockKind};
use dirstore_core::{builtin, BaseId, FieldId, FieldValue, Invid, SessionKey, StoredObject, Value};
use dirstore_durability::RecordRef;
use dirstore_query::{Query, QueryContext};
use dirstore_storage::NamespaceChange;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

type LockSlot = Arc<Mutex<Option<Arc<Lock>>>>;

/// Result of checking an object out for editing
#[derive(Debug)]
pub enum Checkout<'a> {
    /// The object's shadow, ready for changes
    Ready(&'a mut ShadowObject),
    /// Another session has the object checked out
    Unavailable {
        /// Session holding the object
        holder: SessionKey,
    },
}

impl<'a> Checkout<'a> {
    /// The shadow, if the checkout succeeded
    pub fn ready(self) -> Option<&'a mut ShadowObject> {
        match self {
            Checkout::Ready(shadow) => Some(shadow),
            Checkout::Unavailable { .. } => None,
        }
    }

    /// Whether another session holds the object
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Checkout::Unavailable { .. })
    }
}

/// An object as seen by a session
#[derive(Debug, Clone)]
pub enum ObjectRef<'a> {
    /// Committed version
    Live(Arc<StoredObject>),
    /// This session's working copy
    Shadow(&'a ShadowObject),
}

impl ObjectRef<'_> {
    /// The object's fields
    pub fn object(&self) -> &StoredObject {
        match self {
            ObjectRef::Live(object) => object,
            ObjectRef::Shadow(shadow) => shadow.object(),
        }
    }

    /// Whether this is an uncommitted working copy
    pub fn is_shadow(&self) -> bool {
        matches!(self, ObjectRef::Shadow(_))
    }
}

/// Summary of a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    /// Commit time, as stamped on objects and the journal frame
    pub timestamp: DateTime<Utc>,
    /// Objects created, changed or removed
    pub records: usize,
}

/// Handle for aborting a session's lock from another thread
///
/// Aborting unblocks a pending `open_*_lock` with a cancellation error,
/// or releases a lock already held.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    key: SessionKey,
    slot: LockSlot,
}

impl AbortHandle {
    /// Abort the session's current lock; false if it has none
    pub fn abort(&self) -> bool {
        let lock = self.slot.lock().clone();
        match lock {
            Some(lock) => {
                info!(key = %self.key, kind = %lock.kind(), "Aborting session lock");
                lock.abort();
                true
            }
            None => false,
        }
    }
}

/// One client's connection to a store
#[derive(Debug)]
pub struct Session {
    store: Store,
    key: SessionKey,
    label: String,
    lock: LockSlot,
    edit_set: Option<EditSet>,
}

impl Session {
    pub(crate) fn new(store: Store, key: SessionKey, label: String) -> Self {
        debug!(key = %key, label = %label, "Session started");
        Self {
            store,
            key,
            label,
            lock: Arc::new(Mutex::new(None)),
            edit_set: None,
        }
    }

    /// Identity used for locks and checkouts
    pub fn key(&self) -> SessionKey {
        self.key
    }

    /// Label recorded as creator and modifier
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The store this session belongs to
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Handle for aborting this session's lock from elsewhere
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            key: self.key,
            slot: Arc::clone(&self.lock),
        }
    }

    // ========================================================================
    // Locks
    // ========================================================================

    /// Block until a read lock on `bases` is granted
    pub fn open_read_lock(&mut self, bases: &[BaseId]) -> Result<()> {
        self.open_lock(LockKind::Read, bases)
    }

    /// Block until a write lock on `bases` is granted
    ///
    /// A read lock held by this session is released first.
    pub fn open_write_lock(&mut self, bases: &[BaseId]) -> Result<()> {
        self.open_lock(LockKind::Write, bases)
    }

    /// Block until a dump lock on `bases` is granted
    pub fn open_dump_lock(&mut self, bases: &[BaseId]) -> Result<()> {
        self.open_lock(LockKind::Dump, bases)
    }

    /// Release the held lock; false if none was held
    pub fn release_lock(&mut self) -> bool {
        let lock = self.lock.lock().take();
        lock.map_or(false, |l| l.release())
    }

    /// Kind of the established lock, if any
    pub fn lock_kind(&self) -> Option<LockKind> {
        self.held_lock().map(|l| l.kind())
    }

    fn open_lock(&mut self, kind: LockKind, bases: &[BaseId]) -> Result<()> {
        if let Some(held) = self.held_lock() {
            if held.kind() == LockKind::Read && kind == LockKind::Write {
                self.release_lock();
            } else {
                return Err(StoreError::LockHeld(held.kind()));
            }
        }

        let lock = Arc::new(self.store.inner.state.lock(self.key, kind, bases)?);
        *self.lock.lock() = Some(Arc::clone(&lock));
        if let Err(e) = lock.establish() {
            self.lock.lock().take();
            debug!(key = %self.key, kind = %kind, error = %e, "Lock not established");
            return Err(e.into());
        }
        Ok(())
    }

    fn held_lock(&self) -> Option<Arc<Lock>> {
        let mut slot = self.lock.lock();
        if slot.as_ref().map_or(false, |l| !l.is_established()) {
            *slot = None;
        }
        slot.clone()
    }

    fn require_lock(&self, base: BaseId) -> Result<()> {
        match self.held_lock() {
            Some(lock) if lock.covers(base) => Ok(()),
            _ => Err(StoreError::LockNotHeld(base)),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Look an object up
    ///
    /// Objects in the open transaction are returned as shadows without any
    /// lock; live objects need a lock covering their base.
    pub fn view_object(&self, invid: Invid) -> Result<Option<ObjectRef<'_>>> {
        if let Some(shadow) = self.edit_set.as_ref().and_then(|set| set.get(invid)) {
            return Ok(Some(ObjectRef::Shadow(shadow)));
        }
        let base = self
            .store
            .bases()
            .get(invid.base())
            .ok_or(StoreError::UnknownBase(invid.base()))?;
        self.require_lock(invid.base())?;
        Ok(base.get(invid.id()).map(ObjectRef::Live))
    }

    /// Every live object in `base`, in id order
    pub fn live_objects(&self, base: BaseId) -> Result<Vec<Arc<StoredObject>>> {
        let table = self
            .store
            .bases()
            .get(base)
            .ok_or(StoreError::UnknownBase(base))?;
        self.require_lock(base)?;
        Ok(table.objects())
    }

    /// Evaluate a query against an object with this session's labels
    pub fn matches(&self, query: &Query, object: &StoredObject) -> bool {
        dirstore_query::matches(self, query, object)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Whether a transaction is open
    pub fn in_transaction(&self) -> bool {
        self.edit_set.is_some()
    }

    /// The open transaction's edit set
    pub fn edit_set(&self) -> Option<&EditSet> {
        self.edit_set.as_ref()
    }

    /// Start a transaction
    pub fn open_transaction(&mut self) -> Result<()> {
        if self.edit_set.is_some() {
            return Err(StoreError::TransactionOpen);
        }
        self.edit_set = Some(EditSet::new());
        debug!(key = %self.key, "Transaction opened");
        Ok(())
    }

    /// Create an object in `base`
    ///
    /// The id is taken immediately; it is handed back if the transaction
    /// aborts or rolls the creation away.
    pub fn create_object(&mut self, base: BaseId) -> Result<&mut ShadowObject> {
        let set = self.edit_set.as_mut().ok_or(StoreError::NoTransaction)?;
        let table = self
            .store
            .inner
            .bases()
            .get(base)
            .ok_or(StoreError::UnknownBase(base))?;

        let invid = table.invid(table.next_id());
        let mut shadow = ShadowObject::creating(table, invid);
        self.store.inner.hooks.get(base).initialize_new(&mut shadow);
        debug!(key = %self.key, invid = %invid, "Object created");
        Ok(set.insert(shadow))
    }

    /// Check an object out for editing
    ///
    /// Returns the existing shadow when the transaction already has one.
    pub fn edit_object(&mut self, invid: Invid) -> Result<Checkout<'_>> {
        let key = self.key;
        let held = self.held_lock();
        let set = self.edit_set.as_mut().ok_or(StoreError::NoTransaction)?;
        if set.contains(invid) {
            return set
                .get_mut(invid)
                .map(Checkout::Ready)
                .ok_or(StoreError::ObjectNotFound(invid));
        }

        let base = self
            .store
            .inner
            .bases()
            .get(invid.base())
            .ok_or(StoreError::UnknownBase(invid.base()))?;
        if !held.map_or(false, |l| l.covers(invid.base())) {
            return Err(StoreError::LockNotHeld(invid.base()));
        }
        let live = base
            .get(invid.id())
            .ok_or(StoreError::ObjectNotFound(invid))?;
        if let Err(holder) = base.check_out(invid.id(), key) {
            debug!(key = %key, invid = %invid, holder = %holder, "Object checked out elsewhere");
            return Ok(Checkout::Unavailable { holder });
        }

        let shadow = ShadowObject::editing(Arc::clone(&base), &live);
        Ok(Checkout::Ready(set.insert(shadow)))
    }

    /// Mark an object for deletion
    ///
    /// Deleting an object created in this transaction drops it; commit then
    /// ignores it.
    pub fn delete_object(&mut self, invid: Invid) -> Result<Checkout<'_>> {
        match self.edit_object(invid)? {
            Checkout::Ready(shadow) => {
                shadow.mark_deleted();
                Ok(Checkout::Ready(shadow))
            }
            unavailable => Ok(unavailable),
        }
    }

    /// Push a named checkpoint
    pub fn checkpoint(&mut self, name: &str) -> Result<()> {
        self.edit_set
            .as_mut()
            .ok_or(StoreError::NoTransaction)?
            .checkpoint(name);
        Ok(())
    }

    /// Restore the edit set to checkpoint `name`
    ///
    /// Returns false, changing nothing, when no such checkpoint exists.
    pub fn rollback(&mut self, name: &str) -> Result<bool> {
        let set = self.edit_set.as_mut().ok_or(StoreError::NoTransaction)?;
        match set.rollback(name) {
            Some(discarded) => {
                debug!(key = %self.key, checkpoint = name, discarded = discarded.len(), "Rolled back");
                release_shadows(self.key, discarded);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Forget checkpoint `name` without rolling back
    pub fn pop_checkpoint(&mut self, name: &str) -> Result<bool> {
        Ok(self
            .edit_set
            .as_mut()
            .ok_or(StoreError::NoTransaction)?
            .pop_checkpoint(name))
    }

    /// Discard the transaction
    ///
    /// Created ids are handed back and checked-out objects are checked in.
    /// The session's lock is left as it is.
    pub fn abort(&mut self) -> Result<()> {
        let set = self.edit_set.take().ok_or(StoreError::NoTransaction)?;
        let count = set.len();
        let mut shadows = set.into_shadows();
        shadows.reverse();
        release_shadows(self.key, shadows);
        info!(key = %self.key, shadows = count, "Transaction aborted");
        Ok(())
    }

    /// Commit the transaction
    ///
    /// # Errors
    ///
    /// On [`StoreError::NamespaceConflict`], [`StoreError::HookRejected`],
    /// [`StoreError::BaseRemoved`] or a journal failure the transaction
    /// stays open and nothing is installed.
    pub fn commit(&mut self) -> Result<CommitSummary> {
        let touched = self
            .edit_set
            .as_ref()
            .ok_or(StoreError::NoTransaction)?
            .touched_bases();

        let covered = match self.held_lock() {
            Some(lock)
                if lock.kind() == LockKind::Write && touched.iter().all(|b| lock.covers(*b)) =>
            {
                true
            }
            Some(_) => {
                self.release_lock();
                false
            }
            None => false,
        };
        let acquired = !covered && !touched.is_empty();
        if acquired {
            self.open_lock(LockKind::Write, &touched)?;
        }

        let now = Utc::now();
        let applied = self.apply(now);
        if acquired {
            self.release_lock();
        }
        let records = applied?;

        let hooks = &self.store.inner.hooks;
        if let Some(set) = self.edit_set.take() {
            for shadow in set.into_shadows() {
                match shadow.status() {
                    ShadowStatus::Dropping => {
                        shadow.base().release_id(shadow.invid().id());
                    }
                    _ => hooks.get(shadow.base_id()).commit_phase2(&shadow),
                }
            }
        }

        info!(key = %self.key, records, bases = touched.len(), "Transaction committed");
        Ok(CommitSummary {
            timestamp: now,
            records,
        })
    }

    fn apply(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let inner = &self.store.inner;
        let key = self.key;
        let set = self.edit_set.as_mut().ok_or(StoreError::NoTransaction)?;
        let _serial = inner.commit_lock.lock();

        // A schema edit may have replaced a base since its shadows were made
        if let Some(orphan) = set.iter().find(|s| {
            s.status() != ShadowStatus::Dropping
                && !inner
                    .bases()
                    .get(s.base_id())
                    .map_or(false, |live| Arc::ptr_eq(&live, s.base()))
        }) {
            warn!(key = %key, invid = %orphan.invid(), "Commit refused: base was removed");
            return Err(StoreError::BaseRemoved(orphan.base_id()));
        }

        {
            let live: Vec<Option<Arc<StoredObject>>> = set
                .iter()
                .map(|s| match s.status() {
                    ShadowStatus::Editing | ShadowStatus::Deleting => s.base().get(s.invid().id()),
                    _ => None,
                })
                .collect();
            let changes: Vec<NamespaceChange<'_>> = set
                .iter()
                .zip(&live)
                .filter(|(s, _)| s.status() != ShadowStatus::Dropping)
                .map(|(s, old)| NamespaceChange {
                    base: s.def(),
                    old: old.as_deref(),
                    new: (!s.is_deleted()).then(|| s.object()),
                })
                .collect();
            if let Some(conflict) = inner.namespaces.find_conflict(&changes) {
                warn!(key = %key, conflict = %conflict, "Commit refused");
                return Err(StoreError::NamespaceConflict(conflict));
            }
        }

        for shadow in set.iter().filter(|s| s.status() != ShadowStatus::Dropping) {
            inner
                .hooks
                .get(shadow.base_id())
                .commit_phase1(shadow)
                .map_err(|reason| {
                    warn!(key = %key, invid = %shadow.invid(), reason = %reason, "Commit vetoed");
                    StoreError::HookRejected {
                        invid: shadow.invid(),
                        reason,
                    }
                })?;
        }

        let stamp = Value::date(now);
        for shadow in set.iter_mut() {
            stamp_bookkeeping(shadow, &stamp, &self.label);
        }

        if let Some(journal) = &inner.journal {
            let records: Vec<RecordRef<'_>> = set
                .iter()
                .filter_map(|s| match s.status() {
                    ShadowStatus::Creating => Some(RecordRef::Create(s.object())),
                    ShadowStatus::Editing => Some(RecordRef::Edit(s.object())),
                    ShadowStatus::Deleting => Some(RecordRef::Delete(s.invid())),
                    ShadowStatus::Dropping => None,
                })
                .collect();
            if !records.is_empty() {
                journal.write_transaction(now.timestamp_millis(), &records)?;
            }
        }

        let mut applied = 0;
        for shadow in set.iter() {
            let base = shadow.base();
            let id = shadow.invid().id();
            match shadow.status() {
                ShadowStatus::Creating => {
                    base.install_with(&inner.namespaces, shadow.object().clone());
                }
                ShadowStatus::Editing => {
                    base.install_with(&inner.namespaces, shadow.object().clone());
                    base.check_in(id, key);
                }
                ShadowStatus::Deleting => {
                    base.remove_with(&inner.namespaces, id);
                    base.check_in(id, key);
                }
                ShadowStatus::Dropping => continue,
            }
            applied += 1;
        }
        Ok(applied)
    }
}

/// Hand back ids of created objects and check edited ones back in
fn release_shadows(key: SessionKey, shadows: impl IntoIterator<Item = ShadowObject>) {
    for shadow in shadows {
        let id = shadow.invid().id();
        match shadow.status() {
            ShadowStatus::Creating | ShadowStatus::Dropping => {
                shadow.base().release_id(id);
            }
            ShadowStatus::Editing | ShadowStatus::Deleting => {
                shadow.base().check_in(id, key);
            }
        }
    }
}

fn stamp_bookkeeping(shadow: &mut ShadowObject, now: &Value, who: &str) {
    let stamps: &[(FieldId, bool)] = match shadow.status() {
        ShadowStatus::Creating => &[
            (builtin::CREATION_DATE, true),
            (builtin::CREATOR_INFO, false),
            (builtin::MODIFICATION_DATE, true),
            (builtin::MODIFIER_INFO, false),
        ],
        ShadowStatus::Editing => &[
            (builtin::MODIFICATION_DATE, true),
            (builtin::MODIFIER_INFO, false),
        ],
        _ => return,
    };
    for &(field, is_date) in stamps {
        if shadow.def().field(field).is_none() {
            continue;
        }
        let value = if is_date {
            now.clone()
        } else {
            Value::from(who)
        };
        shadow
            .object_mut()
            .set_unchecked(field, FieldValue::Scalar(value));
    }
}

impl QueryContext for Session {
    fn resolve_field(&self, base: BaseId, name: &str) -> Option<FieldId> {
        let table = self.store.bases().get(base)?;
        let id = table.def().field_by_name(name)?.id;
        Some(id)
    }

    fn object_label(&self, object: &StoredObject) -> Option<String> {
        let base = object.invid().base();
        self.store
            .hooks()
            .get(base)
            .label(object)
            .or_else(|| {
                self.store
                    .bases()
                    .get(base)
                    .and_then(|b| object.label(b.def()))
            })
    }

    fn label_of(&self, invid: Invid) -> Option<String> {
        if let Some(shadow) = self.edit_set.as_ref().and_then(|s| s.get(invid)) {
            return self.object_label(shadow.object());
        }
        let live = self.store.bases().resolve(invid)?;
        self.object_label(&live)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.edit_set.is_some() {
            let _ = self.abort();
        }
        self.release_lock();
        debug!(key = %self.key, "Session ended");
    }
}
