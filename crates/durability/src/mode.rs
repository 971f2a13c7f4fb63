//! Durability mode for journal writes.

use serde::{Deserialize, Serialize};

/// Durability mode for journal writes.
///
/// Controls whether a journal is kept at all and when frames are synced.
///
/// # Mode Comparison
///
/// | Mode | On crash | Use Case |
/// |------|----------|----------|
/// | None | All data lost | Tests, scratch stores |
/// | Buffered | Frames in the OS page cache may be lost | Default |
/// | Strict | Nothing acknowledged is lost | Servers that must not lose commits |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurabilityMode {
    /// No journal, no dump file. The store lives only in memory.
    None,

    /// Each frame is written with a single `write_all`; the OS decides
    /// when it reaches the disk.
    #[default]
    Buffered,

    /// Each frame is followed by `sync_data()` before the commit returns.
    Strict,
}

impl DurabilityMode {
    /// Check if this mode keeps a journal.
    ///
    /// Returns false for None mode, true for all others.
    pub fn requires_journal(&self) -> bool {
        !matches!(self, DurabilityMode::None)
    }

    /// Check if this mode syncs after every frame.
    ///
    /// Returns true only for Strict mode.
    pub fn requires_immediate_fsync(&self) -> bool {
        matches!(self, DurabilityMode::Strict)
    }

    /// Human-readable description of the mode.
    pub fn description(&self) -> &'static str {
        match self {
            DurabilityMode::None => "No durability (in memory only)",
            DurabilityMode::Buffered => "Buffered writes (OS decides when to flush)",
            DurabilityMode::Strict => "Synced writes (safest, slowest)",
        }
    }
}
