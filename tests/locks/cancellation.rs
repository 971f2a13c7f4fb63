//! Cancellation Tests
//!
//! Aborting a lock unblocks its waiter; schema edits wait for every lock.

use crate::common::*;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

#[test]
fn abort_unblocks_waiting_session() {
    let store = ephemeral();
    let mut reader = store.session("reader");
    reader.open_read_lock(&[USERS]).unwrap();

    let mut waiting = store.session("waiting");
    let abort = waiting.abort_handle();
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let result = waiting.open_write_lock(&[USERS]);
        tx.send(result.map_err(|e| e.is_cancelled())).unwrap();
        waiting
    });
    thread::sleep(Duration::from_millis(50));
    assert!(rx.try_recv().is_err());

    assert!(abort.abort());
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Err(true));
    let mut waiting = handle.join().unwrap();

    // Queues are clean and the session can lock again
    assert_eq!(store.state().queues(USERS).writers, 0);
    assert_eq!(waiting.lock_kind(), None);
    waiting.open_read_lock(&[USERS]).unwrap();
    assert!(reader.lock_kind().is_some());
}

#[test]
fn abort_releases_held_lock() {
    let store = ephemeral();
    let mut s = store.session("a");
    s.open_write_lock(&[USERS]).unwrap();
    assert!(s.abort_handle().abort());
    assert_eq!(s.lock_kind(), None);
    assert!(!store.state().queues(USERS).write_in_progress);
    assert!(!s.release_lock());
}

#[test]
fn abort_without_lock_is_noop() {
    let store = ephemeral();
    let s = store.session("a");
    assert!(!s.abort_handle().abort());
}

#[test]
fn cancelled_commit_keeps_transaction() {
    let store = ephemeral();
    let mut reader = store.session("reader");
    reader.open_read_lock(&[USERS]).unwrap();

    let mut s = store.session("writer");
    let abort = s.abort_handle();
    s.open_transaction().unwrap();
    s.create_object(USERS).unwrap().set("username", "quentin").unwrap();

    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let result = s.commit();
        tx.send(result.map(|_| ()).map_err(|e| e.is_cancelled())).unwrap();
        s
    });
    thread::sleep(Duration::from_millis(50));
    assert!(abort.abort());
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Err(true));

    let mut s = handle.join().unwrap();
    assert!(s.in_transaction());
    reader.release_lock();
    s.commit().unwrap();
    assert_eq!(usernames(&store), vec!["quentin"]);
}

#[test]
fn schema_edit_waits_for_locks() {
    let store = ephemeral();
    let mut s = store.session("a");
    s.open_read_lock(&[USERS]).unwrap();

    let edit_store = store.clone();
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let edit = edit_store.begin_schema_edit();
        edit.add_base(BaseDef::new(BaseId(7), "Host")).unwrap();
        tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(50));
        edit.finish();
    });
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    s.release_lock();
    rx.recv_timeout(Duration::from_secs(5)).unwrap();

    // Blocks until the edit finishes, then sees the new base
    s.open_read_lock(&[BaseId(7)]).unwrap();
    handle.join().unwrap();
    assert!(store.bases().contains(BaseId(7)));
}
