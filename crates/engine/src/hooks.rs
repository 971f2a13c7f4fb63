//! Per-type customization hooks
//!
//! Each base may register an [`ObjectHook`] that labels its objects,
//! initializes new ones and takes part in commit. Bases without a
//! registration use [`DefaultHook`], which does nothing.
//!
//! Hooks are looked up by type id on every use, so a hook swapped during a
//! schema edit takes effect for the next transaction.

use crate::shadow::ShadowObject;
use dirstore_core::{BaseId, StoredObject};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

/// Customization points for one object type
pub trait ObjectHook: Send + Sync + std::fmt::Debug {
    /// Label for an object; `None` falls back to the base's label field
    fn label(&self, _object: &StoredObject) -> Option<String> {
        None
    }

    /// Called once when a new object is created in a transaction
    fn initialize_new(&self, _shadow: &mut ShadowObject) {}

    /// Called for every shadow before the journal is written
    ///
    /// Returning an error vetoes the whole commit; the transaction stays
    /// open.
    fn commit_phase1(&self, _shadow: &ShadowObject) -> Result<(), String> {
        Ok(())
    }

    /// Called for every shadow after the commit is installed
    fn commit_phase2(&self, _shadow: &ShadowObject) {}
}

/// Hook used for bases with no registration
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHook;

impl ObjectHook for DefaultHook {}

/// Type id to hook table
#[derive(Debug)]
pub struct HookRegistry {
    hooks: RwLock<FxHashMap<BaseId, Arc<dyn ObjectHook>>>,
    fallback: Arc<dyn ObjectHook>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self {
            hooks: RwLock::new(FxHashMap::default()),
            fallback: Arc::new(DefaultHook),
        }
    }
}

impl HookRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook for `base`, or the default hook
    pub fn get(&self, base: BaseId) -> Arc<dyn ObjectHook> {
        self.hooks
            .read()
            .get(&base)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    /// Whether `base` has its own hook
    pub fn is_registered(&self, base: BaseId) -> bool {
        self.hooks.read().contains_key(&base)
    }

    /// Register or replace the hook for `base`, returning the previous one
    pub fn register(&self, base: BaseId, hook: Arc<dyn ObjectHook>) -> Option<Arc<dyn ObjectHook>> {
        debug!(base = base.0, "Hook registered");
        self.hooks.write().insert(base, hook)
    }

    /// Remove the hook for `base`
    pub fn unregister(&self, base: BaseId) -> Option<Arc<dyn ObjectHook>> {
        self.hooks.write().remove(&base)
    }
}
