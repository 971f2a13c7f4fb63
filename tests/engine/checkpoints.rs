//! Checkpoint Tests
//!
//! Rolling back to a checkpoint restores the edit set exactly as it was
//! when the checkpoint was taken.

use crate::common::*;

fn snapshot(session: &Session) -> Vec<(Invid, ShadowStatus, StoredObject)> {
    let mut shadows: Vec<_> = session
        .edit_set()
        .unwrap()
        .iter()
        .map(|s| (s.invid(), s.status(), s.object().clone()))
        .collect();
    shadows.sort_by_key(|(invid, _, _)| *invid);
    shadows
}

#[test]
fn rollback_restores_checkpoint_state() {
    let store = ephemeral();
    let mut s = store.session("a");
    let existing = create_user(&mut s, "ivan", 1);

    s.open_read_lock(&[USERS]).unwrap();
    s.open_transaction().unwrap();
    s.create_object(USERS).unwrap().set("username", "judy").unwrap();
    s.checkpoint("before").unwrap();
    let before = snapshot(&s);

    let created = s.create_object(USERS).unwrap().invid();
    s.edit_object(existing)
        .unwrap()
        .ready()
        .unwrap()
        .set("uid", 99)
        .unwrap();
    s.delete_object(existing).unwrap();
    assert_ne!(snapshot(&s), before);

    assert!(s.rollback("before").unwrap());
    assert_eq!(snapshot(&s), before);

    // The rolled back creation handed its id back, the edit checked in
    let users = store.bases().require(USERS).unwrap();
    assert_eq!(users.max_id(), ObjectId(created.id().0 - 1));
    assert_eq!(users.holder(existing.id()), None);
    assert!(s.edit_set().unwrap().checkpoints().is_empty());
}

#[test]
fn rollback_to_older_checkpoint_pops_newer() {
    let store = ephemeral();
    let mut s = store.session("a");
    s.open_transaction().unwrap();
    s.checkpoint("one").unwrap();
    s.create_object(USERS).unwrap();
    s.checkpoint("two").unwrap();
    s.create_object(USERS).unwrap();
    s.checkpoint("three").unwrap();

    assert!(s.rollback("one").unwrap());
    assert!(s.edit_set().unwrap().is_empty());
    assert!(s.edit_set().unwrap().checkpoints().is_empty());
    assert!(!s.rollback("two").unwrap());
    assert_eq!(store.bases().require(USERS).unwrap().max_id(), ObjectId(0));
}

#[test]
fn unknown_checkpoint_changes_nothing() {
    let store = ephemeral();
    let mut s = store.session("a");
    s.open_transaction().unwrap();
    s.checkpoint("kept").unwrap();
    s.create_object(USERS).unwrap();
    let before = snapshot(&s);

    assert!(!s.rollback("missing").unwrap());
    assert_eq!(snapshot(&s), before);
    assert_eq!(s.edit_set().unwrap().checkpoints(), vec!["kept"]);
}

#[test]
fn pop_checkpoint_keeps_changes() {
    let store = ephemeral();
    let mut s = store.session("a");
    s.open_transaction().unwrap();
    s.checkpoint("cp").unwrap();
    s.create_object(USERS).unwrap().set("username", "ken").unwrap();
    assert!(s.pop_checkpoint("cp").unwrap());
    assert!(!s.pop_checkpoint("cp").unwrap());
    assert!(!s.rollback("cp").unwrap());
    s.commit().unwrap();
    assert_eq!(usernames(&store), vec!["ken"]);
}

#[test]
fn rollback_after_commit_is_misuse() {
    let store = ephemeral();
    let mut s = store.session("a");
    assert!(matches!(
        s.rollback("x"),
        Err(StoreError::NoTransaction)
    ));
}
