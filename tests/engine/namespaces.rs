//! Namespace Tests
//!
//! Unique values are checked at commit across every base sharing a
//! namespace.

use crate::common::*;

#[test]
fn duplicate_across_sessions_is_refused() {
    let store = ephemeral();
    let mut a = store.session("a");
    create_user(&mut a, "Mallory", 1);

    let mut b = store.session("b");
    b.open_transaction().unwrap();
    b.create_object(USERS).unwrap().set("username", "mallory").unwrap();
    let err = b.commit().unwrap_err();
    match &err {
        StoreError::NamespaceConflict(conflict) => {
            assert_eq!(conflict.namespace, "usernames");
            assert_eq!(conflict.holder, Invid::new(USERS, ObjectId(1)));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(dirstore::Error::from(err).is_retryable());

    // Still open; fixing the value lets the commit through
    assert!(b.in_transaction());
    let invid = b.edit_set().unwrap().iter().next().unwrap().invid();
    b.open_read_lock(&[USERS]).unwrap();
    b.edit_object(invid)
        .unwrap()
        .ready()
        .unwrap()
        .set("username", "mallory2")
        .unwrap();
    b.commit().unwrap();
    assert_eq!(usernames(&store), vec!["Mallory", "mallory2"]);
}

#[test]
fn namespace_spans_bases() {
    let store = ephemeral();
    let mut s = store.session("a");
    create_user(&mut s, "niaj", 500);

    s.open_transaction().unwrap();
    let group = s.create_object(GROUPS).unwrap();
    group.set("name", "staff").unwrap();
    group.set("gid", 500).unwrap();
    assert!(matches!(
        s.commit(),
        Err(StoreError::NamespaceConflict(_))
    ));
    s.abort().unwrap();
    assert_eq!(store.bases().require(GROUPS).unwrap().len(), 0);
}

#[test]
fn two_new_objects_claiming_one_value() {
    let store = ephemeral();
    let mut s = store.session("a");
    s.open_transaction().unwrap();
    s.create_object(USERS).unwrap().set("username", "olivia").unwrap();
    s.create_object(USERS).unwrap().set("username", "OLIVIA").unwrap();
    assert!(matches!(
        s.commit(),
        Err(StoreError::NamespaceConflict(_))
    ));
}

#[test]
fn values_can_swap_within_one_transaction() {
    let store = ephemeral();
    let mut s = store.session("a");
    let first = create_user(&mut s, "peggy", 1);
    let second = create_user(&mut s, "rupert", 2);

    s.open_read_lock(&[USERS]).unwrap();
    s.open_transaction().unwrap();
    s.edit_object(first).unwrap().ready().unwrap().set("uid", 2).unwrap();
    s.edit_object(second).unwrap().ready().unwrap().set("uid", 1).unwrap();
    s.commit().unwrap();

    let holder = store.namespaces().holder("uids", &Value::Int(1)).unwrap();
    assert_eq!(holder.invid, second);
    let holder = store.namespaces().holder("uids", &Value::Int(2)).unwrap();
    assert_eq!(holder.invid, first);
}

#[test]
fn delete_frees_value_for_reuse() {
    let store = ephemeral();
    let mut s = store.session("a");
    let old = create_user(&mut s, "sybil", 3);

    s.open_read_lock(&[USERS]).unwrap();
    s.open_transaction().unwrap();
    s.delete_object(old).unwrap();
    s.create_object(USERS).unwrap().set("username", "Sybil").unwrap();
    s.commit().unwrap();
    assert_eq!(usernames(&store), vec!["Sybil"]);
}
