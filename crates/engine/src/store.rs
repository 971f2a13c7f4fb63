//! Store entry point
//!
//! A [`Store`] owns the base table, the lock monitor, the namespaces, the
//! hook registry and (for persistent stores) the journal. It is cheap to
//! clone; every clone and every [`Session`] shares the same state.
//!
//! # Opening
//!
//! ```ignore
//! use dirstore_engine::Store;
//!
//! // In memory, nothing on disk
//! let store = Store::builder().base(users).open()?;
//!
//! // Persistent; replays dump + journal from the directory
//! let store = Store::builder()
//!     .path("/var/lib/dirstore")
//!     .strict()
//!     .base(users)
//!     .open()?;
//! println!("{:?}", store.recovery());
//! ```
//!
//! # Recovery
//!
//! ```text
//! open():
//!   ┌──────────────────────┐
//!   │ load dump (if any)   │  objects + maxId per base
//!   └──────────┬───────────┘
//!              │
//!   ┌──────────▼───────────┐
//!   │ replay journal       │  frame by frame, truncating a torn tail
//!   └──────────┬───────────┘
//!              │
//!   ┌──────────▼───────────┐
//!   │ open journal appends │
//!   └──────────────────────┘
//! ```

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::hooks::{HookRegistry, ObjectHook};
use crate::schema_edit::SchemaEdit;
use crate::session::Session;
use chrono::Utc;
use dirstore_concurrency::{LockKind, StoreState};
use dirstore_core::{BaseDef, BaseId, NamespaceDef, SessionKey};
use dirstore_durability::{load_dump, write_dump, DurabilityMode, Journal, JournalSink};
use dirstore_storage::{BaseTable, NamespaceTable};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// What `open` found on disk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    /// Objects loaded from the dump file
    pub objects_loaded: usize,
    /// Journal frames replayed
    pub frames_applied: usize,
    /// Journal records replayed
    pub records_applied: usize,
    /// Whether a torn trailing frame was cut off
    pub discarded_tail: bool,
}

#[derive(Debug)]
pub(crate) struct StoreInner {
    pub(crate) config: StoreConfig,
    pub(crate) state: Arc<StoreState>,
    pub(crate) namespaces: NamespaceTable,
    pub(crate) hooks: HookRegistry,
    pub(crate) journal: Option<Journal>,
    /// Serializes namespace check, journal write and install across commits
    pub(crate) commit_lock: Mutex<()>,
    next_key: AtomicU64,
    recovery: RecoverySummary,
}

impl StoreInner {
    pub(crate) fn next_key(&self) -> SessionKey {
        SessionKey(self.next_key.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn bases(&self) -> &BaseTable {
        self.state.bases()
    }
}

/// A transactional object store
#[derive(Debug, Clone)]
pub struct Store {
    pub(crate) inner: Arc<StoreInner>,
}

impl Store {
    /// Open a store described by `config`
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::open_with_hooks(config, HookRegistry::new())
    }

    /// Store with no bases and nothing on disk
    pub fn ephemeral() -> Result<Self> {
        Self::open(StoreConfig::default())
    }

    /// Builder for store configuration
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    fn open_with_hooks(config: StoreConfig, hooks: HookRegistry) -> Result<Self> {
        config.validate()?;
        let bases = BaseTable::from_defs(config.bases.iter().cloned())?;
        let namespaces = NamespaceTable::from_defs(config.namespaces.iter())?;
        let mut recovery = RecoverySummary::default();

        let journal = match (config.dump_path(), config.journal_path()) {
            (Some(dump_path), Some(journal_path)) => {
                if let Some(dir) = &config.path {
                    fs::create_dir_all(dir)?;
                }
                if dump_path.exists() {
                    recovery.objects_loaded = load_dump(&dump_path, &bases, &namespaces)?;
                }
                let journal = Journal::open(&journal_path, config.durability)?;
                let loaded = journal.load(&bases, &namespaces)?;
                recovery.frames_applied = loaded.frames_applied;
                recovery.records_applied = loaded.records_applied;
                recovery.discarded_tail = loaded.discarded_tail;
                Some(journal)
            }
            _ => None,
        };

        info!(
            path = ?config.path,
            durability = config.durability.description(),
            bases = bases.len(),
            objects = bases.object_count(),
            frames = recovery.frames_applied,
            "Store opened"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                state: StoreState::new(bases),
                namespaces,
                hooks,
                journal,
                commit_lock: Mutex::new(()),
                next_key: AtomicU64::new(1),
                recovery,
                config,
            }),
        })
    }

    /// Start a session; `label` is recorded as creator / modifier info
    pub fn session(&self, label: impl Into<String>) -> Session {
        Session::new(self.clone(), self.inner.next_key(), label.into())
    }

    /// What was recovered at open
    pub fn recovery(&self) -> &RecoverySummary {
        &self.inner.recovery
    }

    /// Data directory, if persistent
    pub fn path(&self) -> Option<&Path> {
        self.inner.config.path.as_deref()
    }

    /// Configured durability mode
    pub fn durability_mode(&self) -> DurabilityMode {
        self.inner.config.durability
    }

    /// Whether the store keeps a journal and dump on disk
    pub fn is_persistent(&self) -> bool {
        self.inner.journal.is_some()
    }

    /// The lock monitor
    pub fn state(&self) -> &Arc<StoreState> {
        &self.inner.state
    }

    /// Live bases
    pub fn bases(&self) -> &BaseTable {
        self.inner.bases()
    }

    /// Unique-value namespaces
    pub fn namespaces(&self) -> &NamespaceTable {
        &self.inner.namespaces
    }

    /// Per-type hooks
    pub fn hooks(&self) -> &HookRegistry {
        &self.inner.hooks
    }

    /// Replace the journal's sink, returning the old one
    ///
    /// Returns `None` for stores without a journal.
    pub fn swap_journal_sink(&self, sink: Box<dyn JournalSink>) -> Option<Box<dyn JournalSink>> {
        self.inner.journal.as_ref().map(|j| j.swap_sink(sink))
    }

    /// Wait for exclusive schema access
    ///
    /// Blocks until no lock is held or being established; new locks wait
    /// until the returned edit is finished or dropped.
    pub fn begin_schema_edit(&self) -> SchemaEdit<'_> {
        SchemaEdit::new(self, self.inner.state.enter_schema_edit())
    }

    /// Write every base to the dump file and start a fresh journal
    ///
    /// Holds a dump lock on all bases for the duration, so no commit can
    /// land between the dump and the journal reset. Returns the number of
    /// objects written.
    pub fn dump(&self) -> Result<usize> {
        let (Some(path), Some(journal)) = (self.inner.config.dump_path(), &self.inner.journal)
        else {
            return Err(StoreError::NotPersistent);
        };

        let key = self.inner.next_key();
        let bases = self.bases().ids();
        let lock = self.inner.state.lock(key, LockKind::Dump, &bases)?;
        lock.establish()?;

        let written = write_dump(&path, self.bases(), Utc::now().timestamp_millis())?;
        let old = journal.reset()?;
        lock.release();
        debug!(old_journal = %old.display(), "Journal moved aside after dump");
        Ok(written)
    }

    /// Final dump if anything was journaled since the last one
    pub fn close(&self) -> Result<()> {
        match &self.inner.journal {
            Some(journal) if journal.is_dirty() => {
                self.dump()?;
            }
            _ => {}
        }
        info!(path = ?self.inner.config.path, "Store closed");
        Ok(())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for store configuration
///
/// # Example
///
/// ```ignore
/// // Disk-backed, each commit synced
/// let store = Store::builder()
///     .path("./data")
///     .strict()
///     .base(users)
///     .namespace(NamespaceDef::case_insensitive("usernames"))
///     .hook(BaseId(3), Arc::new(UserHook))
///     .open()?;
///
/// // Unit tests: nothing on disk
/// let store = Store::builder().ephemeral().base(users).open()?;
/// ```
#[derive(Debug, Default)]
pub struct StoreBuilder {
    config: StoreConfig,
    hooks: Vec<(BaseId, Arc<dyn ObjectHook>)>,
}

impl StoreBuilder {
    /// Builder with default settings (in memory, buffered)
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration
    pub fn from_config(config: StoreConfig) -> Self {
        Self {
            config,
            hooks: Vec::new(),
        }
    }

    /// Keep files in `path`
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Keep nothing on disk
    pub fn ephemeral(mut self) -> Self {
        self.config.path = None;
        self.config.durability = DurabilityMode::None;
        self
    }

    /// Sync every journal frame before the commit returns
    pub fn strict(mut self) -> Self {
        self.config.durability = DurabilityMode::Strict;
        self
    }

    /// Leave journal frames to the OS page cache (default)
    pub fn buffered(mut self) -> Self {
        self.config.durability = DurabilityMode::Buffered;
        self
    }

    /// Journal file name within the data directory
    pub fn journal_file(mut self, name: impl Into<String>) -> Self {
        self.config.journal_file = name.into();
        self
    }

    /// Dump file name within the data directory
    pub fn dump_file(mut self, name: impl Into<String>) -> Self {
        self.config.dump_file = name.into();
        self
    }

    /// Add an object base
    pub fn base(mut self, def: BaseDef) -> Self {
        self.config.bases.push(def);
        self
    }

    /// Add a unique-value namespace
    pub fn namespace(mut self, def: NamespaceDef) -> Self {
        self.config.namespaces.push(def);
        self
    }

    /// Register a per-type hook
    pub fn hook(mut self, base: BaseId, hook: Arc<dyn ObjectHook>) -> Self {
        self.hooks.push((base, hook));
        self
    }

    /// The configuration built so far
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Data directory that will be used, if any
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.config.path.clone()
    }

    /// Open the store, recovering from disk when persistent
    pub fn open(self) -> Result<Store> {
        let hooks = HookRegistry::new();
        for (base, hook) in self.hooks {
            hooks.register(base, hook);
        }
        Store::open_with_hooks(self.config, hooks)
    }
}
