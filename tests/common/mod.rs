//! Shared helpers for integration tests.

#![allow(dead_code)]

pub use dirstore::prelude::*;
pub use dirstore::{RecoverySummary, StoreError};
pub use std::sync::Arc;
pub use tempfile::TempDir;

pub const GROUPS: BaseId = BaseId(1);
pub const USERS: BaseId = BaseId(3);

pub const USERNAME: FieldId = FieldId(100);
pub const MEMBER_OF: FieldId = FieldId(101);
pub const UID: FieldId = FieldId(102);

/// `User`: unique case-insensitive username, group list, uid
pub fn users_def() -> BaseDef {
    BaseDef::new(USERS, "User")
        .with_field(FieldDef::scalar(100, "username", FieldType::String).unique_in("usernames"))
        .and_then(|d| d.with_field(FieldDef::vector(101, "groups", FieldType::Invid)))
        .and_then(|d| d.with_field(FieldDef::scalar(102, "uid", FieldType::Numeric).unique_in("uids")))
        .and_then(|d| d.with_label("username"))
        .unwrap()
}

/// `Group`: name and gid, labelled by name
pub fn groups_def() -> BaseDef {
    BaseDef::new(GROUPS, "Group")
        .with_field(FieldDef::scalar(100, "name", FieldType::String))
        .and_then(|d| d.with_field(FieldDef::scalar(102, "gid", FieldType::Numeric).unique_in("uids")))
        .and_then(|d| d.with_label("name"))
        .unwrap()
}

pub fn builder() -> StoreBuilder {
    Store::builder()
        .base(groups_def())
        .base(users_def())
        .namespace(NamespaceDef::case_insensitive("usernames"))
        .namespace(NamespaceDef::new("uids"))
}

/// In-memory store with the test schema
pub fn ephemeral() -> Store {
    builder().ephemeral().open().unwrap()
}

/// Persistent store in a temporary directory
pub struct TestStore {
    pub dir: TempDir,
    pub store: Store,
}

impl TestStore {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = builder().path(dir.path()).open().unwrap();
        Self { dir, store }
    }

    pub fn strict() -> Self {
        let dir = TempDir::new().unwrap();
        let store = builder().path(dir.path()).strict().open().unwrap();
        Self { dir, store }
    }

    /// Drop the store without closing it and open the directory again
    pub fn reopen(&mut self) {
        let fresh = {
            let dir = self.dir.path().to_path_buf();
            self.store = Store::ephemeral().unwrap();
            builder().path(dir).open().unwrap()
        };
        self.store = fresh;
    }

    pub fn journal_path(&self) -> std::path::PathBuf {
        self.dir.path().join("journal")
    }

    pub fn dump_path(&self) -> std::path::PathBuf {
        self.dir.path().join("dirstore.db")
    }
}

/// Create and commit one user
pub fn create_user(session: &mut Session, name: &str, uid: i32) -> Invid {
    session.open_transaction().unwrap();
    let shadow = session.create_object(USERS).unwrap();
    shadow.set("username", name).unwrap();
    shadow.set("uid", uid).unwrap();
    let invid = shadow.invid();
    session.commit().unwrap();
    invid
}

/// Live usernames, in id order
pub fn usernames(store: &Store) -> Vec<String> {
    store
        .bases()
        .require(USERS)
        .unwrap()
        .objects()
        .iter()
        .filter_map(|o| o.get_scalar(USERNAME).map(|v| v.to_string()))
        .collect()
}
