//! Transaction Tests
//!
//! Create, edit, delete, abort and check-out behaviour across sessions.

use crate::common::*;

#[test]
fn committed_objects_are_visible_to_other_sessions() {
    let store = ephemeral();
    let mut alice = store.session("alice");
    let invid = create_user(&mut alice, "bob", 1001);

    let mut other = store.session("other");
    other.open_read_lock(&[USERS]).unwrap();
    let view = other.view_object(invid).unwrap().unwrap();
    assert_eq!(view.object().get_scalar(UID), Some(&Value::Int(1001)));
    assert_eq!(
        view.object().get_scalar(builtin::CREATOR_INFO),
        Some(&Value::from("alice"))
    );
}

#[test]
fn uncommitted_changes_stay_private() {
    let store = ephemeral();
    let mut a = store.session("a");
    let invid = create_user(&mut a, "carol", 1);

    a.open_read_lock(&[USERS]).unwrap();
    a.open_transaction().unwrap();
    a.edit_object(invid)
        .unwrap()
        .ready()
        .unwrap()
        .set("uid", 2)
        .unwrap();

    // The editing session sees its shadow
    let mine = a.view_object(invid).unwrap().unwrap();
    assert!(mine.is_shadow());
    assert_eq!(mine.object().get_scalar(UID), Some(&Value::Int(2)));

    // Everyone else still sees the live object
    let mut b = store.session("b");
    b.open_read_lock(&[USERS]).unwrap();
    let theirs = b.view_object(invid).unwrap().unwrap();
    assert_eq!(theirs.object().get_scalar(UID), Some(&Value::Int(1)));
}

#[test]
fn abort_discards_everything() {
    let store = ephemeral();
    let mut s = store.session("a");
    let invid = create_user(&mut s, "dave", 7);

    s.open_read_lock(&[USERS]).unwrap();
    s.open_transaction().unwrap();
    s.create_object(USERS).unwrap().set("username", "eve").unwrap();
    s.delete_object(invid).unwrap().ready().unwrap();
    s.abort().unwrap();

    assert_eq!(usernames(&store), vec!["dave"]);
    let users = store.bases().require(USERS).unwrap();
    assert_eq!(users.holder(invid.id()), None);
    assert_eq!(users.max_id(), ObjectId(1));
    // Lock survives abort
    assert_eq!(s.lock_kind(), Some(LockKind::Read));
}

#[test]
fn delete_removes_object() {
    let store = ephemeral();
    let mut s = store.session("a");
    let invid = create_user(&mut s, "frank", 9);

    s.open_read_lock(&[USERS]).unwrap();
    s.open_transaction().unwrap();
    let shadow = s.delete_object(invid).unwrap().ready().unwrap();
    assert!(shadow.is_deleted());
    assert!(shadow.set("uid", 10).is_err());
    let summary = s.commit().unwrap();
    assert_eq!(summary.records, 1);

    assert!(usernames(&store).is_empty());
    s.open_read_lock(&[USERS]).unwrap();
    assert!(s.view_object(invid).unwrap().is_none());
}

#[test]
fn second_editor_gets_unavailable() {
    let store = ephemeral();
    let mut a = store.session("a");
    let mut b = store.session("b");
    let invid = create_user(&mut a, "grace", 1);

    for s in [&mut a, &mut b] {
        s.open_read_lock(&[USERS]).unwrap();
        s.open_transaction().unwrap();
    }
    assert!(a.edit_object(invid).unwrap().ready().is_some());
    match b.edit_object(invid).unwrap() {
        Checkout::Unavailable { holder } => assert_eq!(holder, a.key()),
        Checkout::Ready(_) => panic!("double check-out"),
    }

    // Editing again in the same transaction returns the same shadow
    a.edit_object(invid)
        .unwrap()
        .ready()
        .unwrap()
        .set("uid", 5)
        .unwrap();
    assert_eq!(a.edit_set().unwrap().len(), 1);

    a.abort().unwrap();
    assert!(b.edit_object(invid).unwrap().ready().is_some());
}

#[test]
fn edit_keeps_creation_stamp() {
    let store = ephemeral();
    let mut creator = store.session("creator");
    let invid = create_user(&mut creator, "heidi", 3);
    let created = store
        .bases()
        .resolve(invid)
        .unwrap()
        .get_scalar(builtin::CREATION_DATE)
        .cloned();

    let mut editor = store.session("editor");
    editor.open_read_lock(&[USERS]).unwrap();
    editor.open_transaction().unwrap();
    editor
        .edit_object(invid)
        .unwrap()
        .ready()
        .unwrap()
        .set("uid", 4)
        .unwrap();
    editor.commit().unwrap();

    let live = store.bases().resolve(invid).unwrap();
    assert_eq!(live.get_scalar(builtin::CREATION_DATE).cloned(), created);
    assert_eq!(
        live.get_scalar(builtin::CREATOR_INFO),
        Some(&Value::from("creator"))
    );
    assert_eq!(
        live.get_scalar(builtin::MODIFIER_INFO),
        Some(&Value::from("editor"))
    );
}

#[test]
fn commit_without_transaction_is_misuse() {
    let store = ephemeral();
    let mut s = store.session("a");
    let err = dirstore::Error::from(s.commit().unwrap_err());
    assert!(matches!(err, dirstore::Error::Misuse(_)));
}

#[test]
fn oversized_string_refused_when_set() {
    let store = ephemeral();
    let mut s = store.session("a");
    s.open_transaction().unwrap();
    let shadow = s.create_object(USERS).unwrap();
    shadow.set("username", "rupert").unwrap();
    let err = shadow.set("username", "ü".repeat(33_000)).unwrap_err();
    assert!(err.is_misuse());
    assert!(matches!(
        err,
        StoreError::Schema(dirstore_core::Error::ValueTooLong { len: 66_000, .. })
    ));

    assert_eq!(s.commit().unwrap().records, 1);
    assert_eq!(usernames(&store), vec!["rupert"]);
}

#[test]
fn empty_transaction_commits() {
    let store = ephemeral();
    let mut s = store.session("a");
    s.open_transaction().unwrap();
    let summary = s.commit().unwrap();
    assert_eq!(summary.records, 0);
    assert!(!s.in_transaction());
}

#[test]
fn sessions_commit_from_many_threads() {
    let store = ephemeral();
    let handles: Vec<_> = (0..8)
        .map(|n| {
            let store = store.clone();
            std::thread::spawn(move || {
                let mut s = store.session(format!("worker-{}", n));
                for i in 0..10 {
                    create_user(&mut s, &format!("user-{}-{}", n, i), n * 100 + i);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let users = store.bases().require(USERS).unwrap();
    assert_eq!(users.len(), 80);
    assert_eq!(users.max_id(), ObjectId(80));
    assert_eq!(store.namespaces().reserved("usernames"), 80);
}
