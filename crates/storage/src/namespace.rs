//! Unique-value namespaces
//!
//! A field definition may name a namespace; every value stored in such a
//! field must then be unique across all objects and fields sharing that
//! namespace. Each namespace maps a value to the `(Invid, FieldId)` that
//! holds it.
//!
//! Reservations follow the live maps: installing an object reserves its
//! values, removing it releases them. [`NamespaceTable::find_conflict`]
//! validates a whole transaction's worth of changes at once, treating the
//! values of every object the transaction replaces as already released.

use crate::error::{Result, StorageError};
use dirstore_core::{BaseDef, FieldId, Invid, NamespaceDef, StoredObject, Value};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

/// Holder of a reserved value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Holder {
    /// Object holding the value
    pub invid: Invid,
    /// Field the value is stored in
    pub field: FieldId,
}

/// A value claimed by two objects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Namespace name
    pub namespace: String,
    /// Contested value
    pub value: Value,
    /// Object already holding the value
    pub holder: Invid,
    /// Object attempting to claim it
    pub claimant: Invid,
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "value '{}' in namespace '{}' is held by {}, requested by {}",
            self.value, self.namespace, self.holder, self.claimant
        )
    }
}

/// One object-level change to validate against the namespaces
#[derive(Debug, Clone, Copy)]
pub struct NamespaceChange<'a> {
    /// Schema of the object's base
    pub base: &'a BaseDef,
    /// Current live version, if any
    pub old: Option<&'a StoredObject>,
    /// Version about to be installed, if any
    pub new: Option<&'a StoredObject>,
}

#[derive(Debug)]
struct Namespace {
    case_insensitive: bool,
    held: FxHashMap<Value, Holder>,
}

impl Namespace {
    fn key(&self, value: &Value) -> Value {
        match value {
            Value::String(s) if self.case_insensitive => Value::String(s.to_lowercase()),
            other => other.clone(),
        }
    }
}

/// All unique-value namespaces of a store
#[derive(Debug, Default)]
pub struct NamespaceTable {
    spaces: RwLock<FxHashMap<String, Namespace>>,
}

impl NamespaceTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding the given namespaces
    pub fn from_defs<'a>(defs: impl IntoIterator<Item = &'a NamespaceDef>) -> Result<Self> {
        let table = Self::new();
        for def in defs {
            table.add(def)?;
        }
        Ok(table)
    }

    /// Register a namespace
    pub fn add(&self, def: &NamespaceDef) -> Result<()> {
        let mut spaces = self.spaces.write();
        if spaces.contains_key(&def.name) {
            return Err(StorageError::NamespaceExists(def.name.clone()));
        }
        spaces.insert(
            def.name.clone(),
            Namespace {
                case_insensitive: def.case_insensitive,
                held: FxHashMap::default(),
            },
        );
        Ok(())
    }

    /// Whether a namespace is registered
    pub fn contains(&self, name: &str) -> bool {
        self.spaces.read().contains_key(name)
    }

    /// Who holds `value` in `namespace`, if anyone
    pub fn holder(&self, namespace: &str, value: &Value) -> Option<Holder> {
        let spaces = self.spaces.read();
        let space = spaces.get(namespace)?;
        space.held.get(&space.key(value)).copied()
    }

    /// Number of values reserved in `namespace`
    pub fn reserved(&self, namespace: &str) -> usize {
        self.spaces
            .read()
            .get(namespace)
            .map_or(0, |space| space.held.len())
    }

    /// Reserve every namespaced value of `object`
    pub fn reserve_object(&self, base: &BaseDef, object: &StoredObject) {
        let mut spaces = self.spaces.write();
        for (name, field, value) in namespaced_values(base, object) {
            let Some(space) = spaces.get_mut(name) else {
                warn!(namespace = name, "Field names an unregistered namespace");
                continue;
            };
            let key = space.key(value);
            let holder = Holder {
                invid: object.invid(),
                field,
            };
            if let Some(previous) = space.held.insert(key, holder) {
                if previous.invid != object.invid() {
                    warn!(
                        namespace = name,
                        value = %value,
                        previous = %previous.invid,
                        current = %object.invid(),
                        "Namespace value reassigned"
                    );
                }
            }
        }
    }

    /// Release every namespaced value `object` holds
    ///
    /// Values held by some other object are left alone.
    pub fn release_object(&self, base: &BaseDef, object: &StoredObject) {
        let mut spaces = self.spaces.write();
        for (name, _, value) in namespaced_values(base, object) {
            if let Some(space) = spaces.get_mut(name) {
                let key = space.key(value);
                if space
                    .held
                    .get(&key)
                    .map_or(false, |h| h.invid == object.invid())
                {
                    space.held.remove(&key);
                }
            }
        }
    }

    /// Check a set of changes for unique-value conflicts
    ///
    /// Values held by any object in `changes` with an `old` version are
    /// treated as released. Returns the first conflict found, either with a
    /// value held outside the change set or between two new objects.
    pub fn find_conflict(&self, changes: &[NamespaceChange<'_>]) -> Option<Conflict> {
        let spaces = self.spaces.read();
        let released: FxHashSet<Invid> = changes
            .iter()
            .filter_map(|c| c.old.map(StoredObject::invid))
            .collect();
        let mut claimed: FxHashMap<(&str, Value), Invid> = FxHashMap::default();

        for change in changes {
            let Some(new) = change.new else { continue };
            for (name, _, value) in namespaced_values(change.base, new) {
                let Some(space) = spaces.get(name) else {
                    continue;
                };
                let key = space.key(value);

                if let Some(other) = claimed.get(&(name, key.clone())) {
                    if *other != new.invid() {
                        return Some(Conflict {
                            namespace: name.to_string(),
                            value: value.clone(),
                            holder: *other,
                            claimant: new.invid(),
                        });
                    }
                }

                if let Some(holder) = space.held.get(&key) {
                    if holder.invid != new.invid() && !released.contains(&holder.invid) {
                        return Some(Conflict {
                            namespace: name.to_string(),
                            value: value.clone(),
                            holder: holder.invid,
                            claimant: new.invid(),
                        });
                    }
                }

                claimed.insert((name, key), new.invid());
            }
        }
        None
    }
}

fn namespaced_values<'a>(
    base: &'a BaseDef,
    object: &'a StoredObject,
) -> impl Iterator<Item = (&'a str, FieldId, &'a Value)> + 'a {
    base.fields.iter().flat_map(move |def| {
        let values = match (&def.namespace, object.get(def.id)) {
            (Some(ns), Some(field_value)) => Some((ns.as_str(), field_value)),
            _ => None,
        };
        values
            .into_iter()
            .flat_map(move |(ns, fv)| fv.values().map(move |v| (ns, def.id, v)))
    })
}
