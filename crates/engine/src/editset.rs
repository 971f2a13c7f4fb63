//! The staged changes of one transaction
//!
//! An [`EditSet`] keeps its shadows in the order they were first checked
//! out, which is also the order their records appear in the journal
//! frame. Checkpoints copy the whole shadow list; rolling back restores
//! the copy and hands back the shadows that no longer belong to the
//! transaction so the caller can release their ids and check-outs.

use crate::shadow::{ShadowObject, ShadowStatus};
use dirstore_core::{BaseId, Invid};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

#[derive(Debug, Clone)]
struct Checkpoint {
    name: String,
    shadows: Vec<ShadowObject>,
}

/// Shadows and checkpoint stack of an open transaction
#[derive(Debug, Default)]
pub struct EditSet {
    shadows: Vec<ShadowObject>,
    index: FxHashMap<Invid, usize>,
    checkpoints: Vec<Checkpoint>,
}

impl EditSet {
    /// Empty edit set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of shadows
    pub fn len(&self) -> usize {
        self.shadows.len()
    }

    /// Whether nothing has been checked out
    pub fn is_empty(&self) -> bool {
        self.shadows.is_empty()
    }

    /// Shadow for `invid`
    pub fn get(&self, invid: Invid) -> Option<&ShadowObject> {
        self.index.get(&invid).map(|i| &self.shadows[*i])
    }

    /// Mutable shadow for `invid`
    pub fn get_mut(&mut self, invid: Invid) -> Option<&mut ShadowObject> {
        let i = *self.index.get(&invid)?;
        Some(&mut self.shadows[i])
    }

    /// Whether `invid` is checked out by this transaction
    pub fn contains(&self, invid: Invid) -> bool {
        self.index.contains_key(&invid)
    }

    /// Add a shadow, returning it
    ///
    /// A shadow for the same invid is replaced in place.
    pub(crate) fn insert(&mut self, shadow: ShadowObject) -> &mut ShadowObject {
        let invid = shadow.invid();
        let i = match self.index.get(&invid) {
            Some(i) => {
                self.shadows[*i] = shadow;
                *i
            }
            None => {
                self.shadows.push(shadow);
                let i = self.shadows.len() - 1;
                self.index.insert(invid, i);
                i
            }
        };
        &mut self.shadows[i]
    }

    /// Shadows in check-out order
    pub fn iter(&self) -> impl Iterator<Item = &ShadowObject> {
        self.shadows.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ShadowObject> {
        self.shadows.iter_mut()
    }

    pub(crate) fn into_shadows(self) -> Vec<ShadowObject> {
        self.shadows
    }

    /// Bases a commit must write-lock: those of every shadow that is not
    /// dropping, sorted
    pub fn touched_bases(&self) -> Vec<BaseId> {
        let mut bases: Vec<BaseId> = self
            .shadows
            .iter()
            .filter(|s| s.status() != ShadowStatus::Dropping)
            .map(|s| s.base_id())
            .collect();
        bases.sort_unstable();
        bases.dedup();
        bases
    }

    // ========================================================================
    // Checkpoints
    // ========================================================================

    /// Push a named snapshot of every shadow
    pub fn checkpoint(&mut self, name: &str) {
        self.checkpoints.push(Checkpoint {
            name: name.to_string(),
            shadows: self.shadows.clone(),
        });
        debug!(checkpoint = name, depth = self.checkpoints.len(), "Checkpoint taken");
    }

    /// Names on the checkpoint stack, oldest first
    pub fn checkpoints(&self) -> Vec<&str> {
        self.checkpoints.iter().map(|c| c.name.as_str()).collect()
    }

    /// Restore the most recent checkpoint called `name`
    ///
    /// That checkpoint and every one above it are removed from the stack.
    /// Returns the shadows checked out since the checkpoint, newest first,
    /// or `None` (leaving everything untouched) if no checkpoint has that
    /// name.
    pub fn rollback(&mut self, name: &str) -> Option<Vec<ShadowObject>> {
        let at = self.checkpoints.iter().rposition(|c| c.name == name)?;
        let restored = self.checkpoints.drain(at..).next()?.shadows;

        let kept: FxHashSet<Invid> = restored.iter().map(ShadowObject::invid).collect();
        let mut discarded: Vec<ShadowObject> = std::mem::take(&mut self.shadows)
            .into_iter()
            .filter(|s| !kept.contains(&s.invid()))
            .collect();
        discarded.reverse();

        self.shadows = restored;
        self.reindex();
        debug!(
            checkpoint = name,
            discarded = discarded.len(),
            depth = self.checkpoints.len(),
            "Rolled back to checkpoint"
        );
        Some(discarded)
    }

    /// Forget the most recent checkpoint called `name` without rolling back
    ///
    /// Checkpoints above it stay on the stack.
    pub fn pop_checkpoint(&mut self, name: &str) -> bool {
        match self.checkpoints.iter().rposition(|c| c.name == name) {
            Some(at) => {
                self.checkpoints.remove(at);
                true
            }
            None => false,
        }
    }

    fn reindex(&mut self) {
        self.index = self
            .shadows
            .iter()
            .enumerate()
            .map(|(i, s)| (s.invid(), i))
            .collect();
    }
}
