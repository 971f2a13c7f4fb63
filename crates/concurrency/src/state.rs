//! Store-wide monitor shared by every lock
//!
//! One `parking_lot::Mutex` guards the lock table of the whole store and
//! one `Condvar` is broadcast on every change to it. Each waiting lock
//! re-checks its own admission predicate on wake-up.
//!
//! ## Lock Table
//!
//! ```text
//! per base:  readers   - established read locks
//!            writers   - write locks registered in phase 1 or holding
//!            dumpers   - established dump locks
//!            write_in_progress / current - the write lock holding the base
//! store:     keys      - session key -> lock (one lock per key)
//!            slots     - per-lock phase and abort flag
//!            schema_edit
//! ```
//!
//! Queue membership is kept in sets: admission is decided by predicate,
//! not by position, so no ordering between waiting writers and dumpers is
//! promised.

use crate::error::{LockError, Result};
use crate::lock::{Lock, LockKind};
use dirstore_core::{BaseId, SessionKey};
use dirstore_storage::BaseTable;
use parking_lot::{Condvar, Mutex, MutexGuard};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Identity of one lock handle within a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockId(pub u64);

impl std::fmt::Display for LockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lock-{}", self.0)
    }
}

/// Lifecycle of a lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPhase {
    /// Created, `establish` not yet called
    Unestablished,
    /// A thread is blocked inside `establish`
    Establishing,
    /// Granted
    Established,
    /// Released after being granted
    Released,
    /// Aborted before being granted
    Aborted,
}

#[derive(Debug)]
pub(crate) struct LockSlot {
    pub(crate) phase: LockPhase,
    pub(crate) aborted: bool,
}

/// Lock queues of one base
#[derive(Debug, Default)]
pub(crate) struct BaseQueues {
    pub(crate) readers: FxHashSet<LockId>,
    pub(crate) writers: FxHashSet<LockId>,
    pub(crate) dumpers: FxHashSet<LockId>,
    pub(crate) write_in_progress: bool,
    pub(crate) current: Option<LockId>,
}

/// State guarded by the store monitor
#[derive(Debug, Default)]
pub(crate) struct LockTable {
    queues: FxHashMap<BaseId, BaseQueues>,
    pub(crate) keys: FxHashMap<SessionKey, LockId>,
    pub(crate) slots: FxHashMap<LockId, LockSlot>,
    pub(crate) schema_edit: bool,
    notifications: u64,
}

impl LockTable {
    /// Queues of a base, created on first registration
    pub(crate) fn queues_mut(&mut self, base: BaseId) -> &mut BaseQueues {
        self.queues.entry(base).or_default()
    }

    pub(crate) fn readers_empty(&self, base: BaseId) -> bool {
        self.queues.get(&base).map_or(true, |q| q.readers.is_empty())
    }

    pub(crate) fn dumpers_empty(&self, base: BaseId) -> bool {
        self.queues.get(&base).map_or(true, |q| q.dumpers.is_empty())
    }

    /// A writer is queued or holding the base
    pub(crate) fn has_writer(&self, base: BaseId) -> bool {
        self.queues
            .get(&base)
            .map_or(false, |q| !q.writers.is_empty() || q.write_in_progress)
    }

    pub(crate) fn write_in_progress(&self, base: BaseId) -> bool {
        self.queues.get(&base).map_or(false, |q| q.write_in_progress)
    }

    pub(crate) fn slot(&self, id: LockId) -> Option<&LockSlot> {
        self.slots.get(&id)
    }

    pub(crate) fn slot_mut(&mut self, id: LockId) -> Option<&mut LockSlot> {
        self.slots.get_mut(&id)
    }

    /// Locks that are granted or in the middle of being granted
    fn active_locks(&self) -> usize {
        self.slots
            .values()
            .filter(|s| matches!(s.phase, LockPhase::Establishing | LockPhase::Established))
            .count()
    }

    /// Remove `id` from every queue of `base`, clearing a held write
    pub(crate) fn unregister(&mut self, base: BaseId, id: LockId) {
        if let Some(q) = self.queues.get_mut(&base) {
            q.readers.remove(&id);
            q.writers.remove(&id);
            q.dumpers.remove(&id);
            if q.current == Some(id) {
                q.current = None;
                q.write_in_progress = false;
            }
        }
    }
}

/// Point-in-time view of one base's lock queues
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// Established read locks
    pub readers: usize,
    /// Write locks queued or holding
    pub writers: usize,
    /// Established dump locks
    pub dumpers: usize,
    /// Whether a write lock holds the base
    pub write_in_progress: bool,
    /// The write lock holding the base
    pub current: Option<LockId>,
}

/// The store-wide monitor: base table plus lock table
///
/// Shared by reference (`Arc`) between the store and every lock handle.
/// There is no global instance; each store owns its own.
///
/// # Example
///
/// ```
/// use dirstore_concurrency::{LockKind, StoreState};
/// use dirstore_core::{BaseDef, BaseId, SessionKey};
/// use dirstore_storage::BaseTable;
///
/// let bases = BaseTable::from_defs(vec![BaseDef::new(BaseId(3), "User")]).unwrap();
/// let state = StoreState::new(bases);
///
/// let lock = state.lock(SessionKey(1), LockKind::Read, &[BaseId(3)]).unwrap();
/// lock.establish().unwrap();
/// assert_eq!(state.queues(BaseId(3)).readers, 1);
/// lock.release();
/// ```
#[derive(Debug)]
pub struct StoreState {
    bases: BaseTable,
    table: Mutex<LockTable>,
    changed: Condvar,
    next_lock: AtomicU64,
}

impl StoreState {
    /// Create a monitor over `bases`
    pub fn new(bases: BaseTable) -> Arc<Self> {
        Arc::new(Self {
            bases,
            table: Mutex::new(LockTable::default()),
            changed: Condvar::new(),
            next_lock: AtomicU64::new(1),
        })
    }

    /// The base table
    pub fn bases(&self) -> &BaseTable {
        &self.bases
    }

    /// Create an unestablished lock handle
    ///
    /// # Errors
    ///
    /// [`LockError::UnknownBase`] if any base is not registered.
    pub fn lock(
        self: &Arc<Self>,
        key: SessionKey,
        kind: LockKind,
        bases: &[BaseId],
    ) -> Result<Lock> {
        if let Some(missing) = bases.iter().find(|b| !self.bases.contains(**b)) {
            return Err(LockError::UnknownBase(*missing));
        }
        let id = LockId(self.next_lock.fetch_add(1, Ordering::Relaxed));
        self.table.lock().slots.insert(
            id,
            LockSlot {
                phase: LockPhase::Unestablished,
                aborted: false,
            },
        );
        Ok(Lock::new(Arc::clone(self), id, key, kind, bases))
    }

    /// Snapshot of a base's queues
    pub fn queues(&self, base: BaseId) -> QueueSnapshot {
        let table = self.table.lock();
        table
            .queues
            .get(&base)
            .map(|q| QueueSnapshot {
                readers: q.readers.len(),
                writers: q.writers.len(),
                dumpers: q.dumpers.len(),
                write_in_progress: q.write_in_progress,
                current: q.current,
            })
            .unwrap_or_default()
    }

    /// The lock currently owned by `key`, if any
    pub fn lock_of(&self, key: SessionKey) -> Option<LockId> {
        self.table.lock().keys.get(&key).copied()
    }

    /// Phase of a lock, or `None` once its handle is dropped
    pub fn phase(&self, id: LockId) -> Option<LockPhase> {
        self.table.lock().slot(id).map(|s| s.phase)
    }

    /// Number of broadcasts issued so far
    pub fn notifications(&self) -> u64 {
        self.table.lock().notifications
    }

    /// Whether a schema edit is in progress
    pub fn schema_edit_in_progress(&self) -> bool {
        self.table.lock().schema_edit
    }

    pub(crate) fn table(&self) -> MutexGuard<'_, LockTable> {
        self.table.lock()
    }

    /// Block on the monitor until the next broadcast
    pub(crate) fn wait(&self, table: &mut MutexGuard<'_, LockTable>) {
        self.changed.wait(table);
    }

    /// Broadcast a change to every waiter
    pub(crate) fn notify(&self, table: &mut MutexGuard<'_, LockTable>) {
        table.notifications += 1;
        self.changed.notify_all();
    }

    // ========================================================================
    // Schema edit exclusivity
    // ========================================================================

    /// Wait until no lock is held or being established, then keep every
    /// new lock waiting until the returned guard is dropped
    pub fn enter_schema_edit(self: &Arc<Self>) -> SchemaGuard {
        let mut table = self.table.lock();
        while table.schema_edit || table.active_locks() > 0 {
            self.changed.wait(&mut table);
        }
        table.schema_edit = true;
        info!("Schema edit started");
        SchemaGuard {
            state: Arc::clone(self),
        }
    }

    fn exit_schema_edit(&self) {
        let mut table = self.table.lock();
        table.schema_edit = false;
        self.notify(&mut table);
        debug!("Schema edit finished");
    }
}

/// Exclusive schema-edit access to a store
///
/// While alive, every lock `establish` waits. Dropping the guard lets
/// them proceed.
#[derive(Debug)]
pub struct SchemaGuard {
    state: Arc<StoreState>,
}

impl SchemaGuard {
    /// The monitor this guard holds
    pub fn state(&self) -> &Arc<StoreState> {
        &self.state
    }
}

impl Drop for SchemaGuard {
    fn drop(&mut self) {
        self.state.exit_schema_edit();
    }
}
