//! Read, write and dump locks over a set of object bases
//!
//! A [`Lock`] is a small closed sum over [`LockKind`]. All three kinds
//! share one wait loop ([`Lock::wait_until`]) and differ only in their
//! admission predicate and in which queues they join.
//!
//! ## Admission
//!
//! | Kind  | Waits until (on every target base)                      | Joins     |
//! |-------|----------------------------------------------------------|-----------|
//! | Read  | no writer queued or holding, no schema edit              | readers   |
//! | Write | 1: no dumper, no schema edit; 2: no reader, no writer    | writers   |
//! | Dump  | no writer queued or holding, no schema edit              | dumpers   |
//!
//! A writer joins the writer queue between its two phases, which holds
//! off new readers and dumpers while the existing ones drain.
//!
//! ## Lifecycle
//!
//! ```text
//! Unestablished -> Establishing -> Established -> Released
//!                       |
//!                       +-> Aborted
//! ```
//!
//! Any failure inside `establish` removes every registration the lock made
//! and broadcasts before the error is returned.

use crate::error::{LockError, Result};
use crate::state::{LockId, LockPhase, LockTable, StoreState};
use dirstore_core::{BaseId, SessionKey};
use parking_lot::MutexGuard;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::debug;

/// The three lock classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    /// Shared access; excludes writers
    Read,
    /// Exclusive access; excludes readers, dumpers and other writers
    Write,
    /// Shared access for a consistent export; excludes writers
    Dump,
}

impl std::fmt::Display for LockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockKind::Read => write!(f, "read"),
            LockKind::Write => write!(f, "write"),
            LockKind::Dump => write!(f, "dump"),
        }
    }
}

/// A lock on a fixed set of bases, owned by one session key
///
/// The handle may be shared (`Arc<Lock>`) so that another thread can call
/// [`Lock::abort`] while the owner is blocked in [`Lock::establish`].
/// Dropping the handle releases the lock.
#[derive(Debug)]
pub struct Lock {
    state: Arc<StoreState>,
    id: LockId,
    key: SessionKey,
    kind: LockKind,
    bases: SmallVec<[BaseId; 4]>,
}

impl Lock {
    pub(crate) fn new(
        state: Arc<StoreState>,
        id: LockId,
        key: SessionKey,
        kind: LockKind,
        bases: &[BaseId],
    ) -> Self {
        let mut bases: SmallVec<[BaseId; 4]> = bases.iter().copied().collect();
        bases.sort_unstable();
        bases.dedup();
        Self {
            state,
            id,
            key,
            kind,
            bases,
        }
    }

    /// Lock identity
    pub fn id(&self) -> LockId {
        self.id
    }

    /// Owning session key
    pub fn key(&self) -> SessionKey {
        self.key
    }

    /// Lock class
    pub fn kind(&self) -> LockKind {
        self.kind
    }

    /// Target bases, sorted
    pub fn bases(&self) -> &[BaseId] {
        &self.bases
    }

    /// Whether `base` is one of the target bases
    pub fn covers(&self, base: BaseId) -> bool {
        self.bases.binary_search(&base).is_ok()
    }

    /// Current phase
    pub fn phase(&self) -> LockPhase {
        self.state
            .table()
            .slot(self.id)
            .map_or(LockPhase::Released, |s| s.phase)
    }

    /// Whether the lock is granted
    pub fn is_established(&self) -> bool {
        self.phase() == LockPhase::Established
    }

    /// Block until the lock is granted
    ///
    /// # Errors
    ///
    /// - [`LockError::Cancelled`] if [`Lock::abort`] was called before or
    ///   during the wait
    /// - [`LockError::KeyInUse`] if the key already owns another lock
    /// - [`LockError::AlreadyEstablished`] / [`LockError::Released`] on
    ///   handle misuse
    pub fn establish(&self) -> Result<()> {
        let mut table = self.state.table();

        let slot = table.slot(self.id).ok_or(LockError::Released)?;
        match slot.phase {
            LockPhase::Unestablished => {}
            LockPhase::Establishing | LockPhase::Established => {
                return Err(LockError::AlreadyEstablished)
            }
            LockPhase::Released => return Err(LockError::Released),
            LockPhase::Aborted => return Err(LockError::Cancelled),
        }
        if slot.aborted {
            self.set_phase(&mut table, LockPhase::Aborted);
            return Err(LockError::Cancelled);
        }
        if table.keys.contains_key(&self.key) {
            return Err(LockError::KeyInUse(self.key));
        }

        table.keys.insert(self.key, self.id);
        self.set_phase(&mut table, LockPhase::Establishing);
        debug!(
            lock = %self.id,
            key = %self.key,
            kind = %self.kind,
            bases = ?self.bases.as_slice(),
            "Establishing lock"
        );

        let granted = match self.kind {
            LockKind::Read => self.establish_read(&mut table),
            LockKind::Write => self.establish_write(&mut table),
            LockKind::Dump => self.establish_dump(&mut table),
        };

        match granted {
            Ok(()) => {
                self.set_phase(&mut table, LockPhase::Established);
                // Wakes any release() waiting for establish to finish
                self.state.notify(&mut table);
                debug!(lock = %self.id, key = %self.key, kind = %self.kind, "Lock established");
                Ok(())
            }
            Err(e) => {
                self.unwind(&mut table);
                debug!(lock = %self.id, key = %self.key, error = %e, "Lock establish failed");
                Err(e)
            }
        }
    }

    fn establish_read(&self, table: &mut MutexGuard<'_, LockTable>) -> Result<()> {
        self.wait_until(table, |t| {
            !t.schema_edit && self.bases.iter().all(|b| !t.has_writer(*b))
        })?;
        for base in &self.bases {
            table.queues_mut(*base).readers.insert(self.id);
        }
        Ok(())
    }

    fn establish_write(&self, table: &mut MutexGuard<'_, LockTable>) -> Result<()> {
        // Phase 1: let dumps drain before announcing ourselves
        self.wait_until(table, |t| {
            !t.schema_edit && self.bases.iter().all(|b| t.dumpers_empty(*b))
        })?;
        for base in &self.bases {
            table.queues_mut(*base).writers.insert(self.id);
        }

        // Phase 2: wait for readers and any other writer to leave
        self.wait_until(table, |t| {
            self.bases
                .iter()
                .all(|b| t.readers_empty(*b) && !t.write_in_progress(*b))
        })?;
        for base in &self.bases {
            let queues = table.queues_mut(*base);
            queues.write_in_progress = true;
            queues.current = Some(self.id);
        }
        Ok(())
    }

    fn establish_dump(&self, table: &mut MutexGuard<'_, LockTable>) -> Result<()> {
        self.wait_until(table, |t| {
            !t.schema_edit && self.bases.iter().all(|b| !t.has_writer(*b))
        })?;
        for base in &self.bases {
            table.queues_mut(*base).dumpers.insert(self.id);
        }
        Ok(())
    }

    /// Wait on the store monitor until `ready` holds or the lock is aborted
    fn wait_until<F>(&self, table: &mut MutexGuard<'_, LockTable>, ready: F) -> Result<()>
    where
        F: Fn(&LockTable) -> bool,
    {
        loop {
            if table.slot(self.id).map_or(true, |s| s.aborted) {
                return Err(LockError::Cancelled);
            }
            if ready(&**table) {
                return Ok(());
            }
            self.state.wait(table);
        }
    }

    /// Undo every registration made by a failed establish
    fn unwind(&self, table: &mut MutexGuard<'_, LockTable>) {
        for base in &self.bases {
            table.unregister(*base, self.id);
        }
        if table.keys.get(&self.key) == Some(&self.id) {
            table.keys.remove(&self.key);
        }
        self.set_phase(table, LockPhase::Aborted);
        self.state.notify(table);
    }

    fn set_phase(&self, table: &mut MutexGuard<'_, LockTable>, phase: LockPhase) {
        if let Some(slot) = table.slot_mut(self.id) {
            slot.phase = phase;
        }
    }

    /// Release the lock
    ///
    /// Blocks while another thread is inside `establish` for this handle.
    /// Returns `true` if this call released a granted lock; further calls
    /// are no-ops returning `false` and do not touch the queues.
    pub fn release(&self) -> bool {
        let mut table = self.state.table();
        while table
            .slot(self.id)
            .map_or(false, |s| s.phase == LockPhase::Establishing)
        {
            self.state.wait(&mut table);
        }

        if table.slot(self.id).map(|s| s.phase) != Some(LockPhase::Established) {
            return false;
        }

        for base in &self.bases {
            table.unregister(*base, self.id);
        }
        if table.keys.get(&self.key) == Some(&self.id) {
            table.keys.remove(&self.key);
        }
        self.set_phase(&mut table, LockPhase::Released);
        self.state.notify(&mut table);
        debug!(lock = %self.id, key = %self.key, kind = %self.kind, "Lock released");
        true
    }

    /// Abort the lock
    ///
    /// A thread blocked in `establish` unwinds and receives
    /// [`LockError::Cancelled`]; a granted lock is released. The lock can
    /// never be established afterwards.
    pub fn abort(&self) {
        {
            let mut table = self.state.table();
            if let Some(slot) = table.slot_mut(self.id) {
                slot.aborted = true;
            }
            self.state.notify(&mut table);
        }
        debug!(lock = %self.id, key = %self.key, "Lock aborted");
        self.release();
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        self.release();
        self.state.table().slots.remove(&self.id);
    }
}
