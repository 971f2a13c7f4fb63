//! Store configuration
//!
//! A [`StoreConfig`] can be built in code (usually through
//! [`StoreBuilder`](crate::StoreBuilder)) or loaded from TOML:
//!
//! ```toml
//! path = "/var/lib/dirstore"
//! durability = "strict"
//!
//! [[namespaces]]
//! name = "usernames"
//! case_insensitive = true
//!
//! [[bases]]
//! id = 3
//! name = "User"
//! label = "username"
//!
//! [[bases.fields]]
//! id = 100
//! name = "username"
//! type = "string"
//! namespace = "usernames"
//!
//! [[bases.fields]]
//! id = 101
//! name = "groups"
//! type = "invid"
//! array = true
//! ```
//!
//! Built-in fields are never listed; every base gets them automatically.

use crate::error::{Result, StoreError};
use dirstore_core::{BaseDef, BaseId, FieldDef, NamespaceDef};
use dirstore_durability::DurabilityMode;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Default journal file name inside the data directory
pub const DEFAULT_JOURNAL_FILE: &str = "journal";
/// Default dump file name inside the data directory
pub const DEFAULT_DUMP_FILE: &str = "dirstore.db";

/// Everything needed to open a store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Data directory; `None` keeps the store entirely in memory
    pub path: Option<PathBuf>,
    /// How commits reach the disk
    pub durability: DurabilityMode,
    /// Journal file name, relative to `path`
    pub journal_file: String,
    /// Dump file name, relative to `path`
    pub dump_file: String,
    /// Object bases
    pub bases: Vec<BaseDef>,
    /// Unique-value namespaces
    pub namespaces: Vec<NamespaceDef>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            durability: DurabilityMode::default(),
            journal_file: DEFAULT_JOURNAL_FILE.to_string(),
            dump_file: DEFAULT_DUMP_FILE.to_string(),
            bases: Vec::new(),
            namespaces: Vec::new(),
        }
    }
}

impl StoreConfig {
    /// Parse a TOML configuration document
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let doc: ConfigDocument =
            toml::from_str(raw).map_err(|e| StoreError::Config(e.to_string()))?;
        let config = doc.into_config()?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Whether the store keeps files on disk
    ///
    /// Needs both a data directory and a durability mode that keeps a
    /// journal.
    pub fn is_persistent(&self) -> bool {
        self.path.is_some() && self.durability.requires_journal()
    }

    /// Full journal path, if persistent
    pub fn journal_path(&self) -> Option<PathBuf> {
        self.data_dir().map(|p| p.join(&self.journal_file))
    }

    /// Full dump path, if persistent
    pub fn dump_path(&self) -> Option<PathBuf> {
        self.data_dir().map(|p| p.join(&self.dump_file))
    }

    fn data_dir(&self) -> Option<&Path> {
        self.path.as_deref().filter(|_| self.durability.requires_journal())
    }

    /// Check cross references: unique base ids and names, and namespaces
    /// named by fields must be declared
    pub fn validate(&self) -> Result<()> {
        let mut ids = BTreeSet::new();
        let mut names = BTreeSet::new();
        for base in &self.bases {
            if !ids.insert(base.type_id) {
                return Err(StoreError::Config(format!(
                    "base id {} declared twice",
                    base.type_id
                )));
            }
            if !names.insert(base.name.as_str()) {
                return Err(StoreError::Config(format!(
                    "base name '{}' declared twice",
                    base.name
                )));
            }
        }

        let declared: BTreeSet<&str> = self.namespaces.iter().map(|n| n.name.as_str()).collect();
        if declared.len() != self.namespaces.len() {
            return Err(StoreError::Config("namespace declared twice".to_string()));
        }
        for field in self.bases.iter().flat_map(|b| b.fields.iter()) {
            if let Some(ns) = &field.namespace {
                if !declared.contains(ns.as_str()) {
                    return Err(StoreError::UnknownNamespace(ns.clone()));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// TOML document
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDocument {
    path: Option<PathBuf>,
    #[serde(default)]
    durability: DurabilityMode,
    journal_file: Option<String>,
    dump_file: Option<String>,
    #[serde(default)]
    namespaces: Vec<NamespaceDef>,
    #[serde(default)]
    bases: Vec<BaseDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BaseDocument {
    id: i16,
    name: String,
    label: Option<String>,
    #[serde(default)]
    embedded: bool,
    #[serde(default)]
    fields: Vec<FieldDef>,
}

impl BaseDocument {
    fn into_def(self) -> Result<BaseDef> {
        let mut def = if self.embedded {
            BaseDef::embedded(BaseId(self.id), self.name)
        } else {
            BaseDef::new(BaseId(self.id), self.name)
        };
        for field in self.fields {
            def.add_field(field)?;
        }
        match self.label {
            Some(label) => Ok(def.with_label(&label)?),
            None => Ok(def),
        }
    }
}

impl ConfigDocument {
    fn into_config(self) -> Result<StoreConfig> {
        let bases = self
            .bases
            .into_iter()
            .map(BaseDocument::into_def)
            .collect::<Result<Vec<_>>>()?;
        Ok(StoreConfig {
            path: self.path,
            durability: self.durability,
            journal_file: self
                .journal_file
                .unwrap_or_else(|| DEFAULT_JOURNAL_FILE.to_string()),
            dump_file: self.dump_file.unwrap_or_else(|| DEFAULT_DUMP_FILE.to_string()),
            bases,
            namespaces: self.namespaces,
        })
    }
}
