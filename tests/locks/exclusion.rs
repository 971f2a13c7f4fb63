//! Exclusion Tests

use crate::common::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

#[test]
fn readers_share_writer_excludes() {
    let store = ephemeral();
    let mut r1 = store.session("r1");
    let mut r2 = store.session("r2");
    r1.open_read_lock(&[USERS]).unwrap();
    r2.open_read_lock(&[USERS]).unwrap();
    assert_eq!(store.state().queues(USERS).readers, 2);

    let writer_store = store.clone();
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let mut w = writer_store.session("w");
        w.open_write_lock(&[USERS]).unwrap();
        tx.send(()).unwrap();
        w.release_lock();
    });
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    r1.release_lock();
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    r2.release_lock();
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    handle.join().unwrap();
}

#[test]
fn locks_on_other_bases_do_not_interfere() {
    let store = ephemeral();
    let mut w = store.session("w");
    w.open_write_lock(&[USERS]).unwrap();
    let mut r = store.session("r");
    r.open_read_lock(&[GROUPS]).unwrap();
    assert_eq!(r.lock_kind(), Some(LockKind::Read));
}

#[test]
fn writers_are_mutually_exclusive() {
    let store = ephemeral();
    let inside = Arc::new(AtomicUsize::new(0));
    let overlap = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let store = store.clone();
            let inside = Arc::clone(&inside);
            let overlap = Arc::clone(&overlap);
            thread::spawn(move || {
                let mut s = store.session(format!("w{}", n));
                for _ in 0..20 {
                    s.open_write_lock(&[USERS, GROUPS]).unwrap();
                    if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                        overlap.store(true, Ordering::SeqCst);
                    }
                    thread::yield_now();
                    inside.fetch_sub(1, Ordering::SeqCst);
                    s.release_lock();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert!(!overlap.load(Ordering::SeqCst));
}

#[test]
fn writer_granted_once_dumps_drain() {
    let store = ephemeral();
    let mut dumpers: Vec<Session> = (0..4).map(|n| store.session(format!("dump{}", n))).collect();
    for d in &mut dumpers {
        d.open_dump_lock(&[USERS, GROUPS]).unwrap();
    }
    assert_eq!(store.state().queues(USERS).dumpers, 4);

    let (tx, rx) = mpsc::channel();
    let writer_store = store.clone();
    let writer = thread::spawn(move || {
        let mut s = writer_store.session("writer");
        s.open_write_lock(&[USERS]).unwrap();
        tx.send(()).unwrap();
        s.release_lock();
    });

    // Held off while any dump remains
    for d in &mut dumpers {
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        d.release_lock();
    }
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    writer.join().unwrap();
}

#[test]
fn queued_writer_holds_off_new_dumps() {
    let store = ephemeral();
    let mut reader = store.session("reader");
    reader.open_read_lock(&[USERS]).unwrap();

    let ws = store.clone();
    let writer = thread::spawn(move || {
        let mut s = ws.session("writer");
        s.open_write_lock(&[USERS]).unwrap();
        thread::sleep(Duration::from_millis(20));
        s.release_lock();
    });
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while store.state().queues(USERS).writers == 0 {
        assert!(std::time::Instant::now() < deadline);
        thread::sleep(Duration::from_millis(1));
    }

    let (tx, rx) = mpsc::channel();
    let ds = store.clone();
    let dumper = thread::spawn(move || {
        let mut s = ds.session("dumper");
        s.open_dump_lock(&[USERS]).unwrap();
        tx.send(()).unwrap();
    });
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    reader.release_lock();
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    writer.join().unwrap();
    dumper.join().unwrap();
}

#[test]
fn queued_writer_holds_off_new_readers() {
    let store = ephemeral();
    let mut first = store.session("first");
    first.open_read_lock(&[USERS]).unwrap();

    let (wtx, wrx) = mpsc::channel();
    let ws = store.clone();
    let writer = thread::spawn(move || {
        let mut s = ws.session("writer");
        s.open_write_lock(&[USERS]).unwrap();
        wtx.send(()).unwrap();
        thread::sleep(Duration::from_millis(50));
        s.release_lock();
    });
    // Wait for the writer to queue
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while store.state().queues(USERS).writers == 0 {
        assert!(std::time::Instant::now() < deadline);
        thread::sleep(Duration::from_millis(1));
    }

    let (rtx, rrx) = mpsc::channel();
    let rs = store.clone();
    let late = thread::spawn(move || {
        let mut s = rs.session("late");
        s.open_read_lock(&[USERS]).unwrap();
        rtx.send(()).unwrap();
    });
    assert!(rrx.recv_timeout(Duration::from_millis(100)).is_err());

    first.release_lock();
    wrx.recv_timeout(Duration::from_secs(5)).unwrap();
    rrx.recv_timeout(Duration::from_secs(5)).unwrap();
    writer.join().unwrap();
    late.join().unwrap();
}

#[test]
fn release_is_idempotent() {
    let store = ephemeral();
    let mut s = store.session("a");
    assert!(!s.release_lock());
    s.open_dump_lock(&[USERS, GROUPS]).unwrap();
    assert_eq!(store.state().queues(GROUPS).dumpers, 1);
    assert!(s.release_lock());
    assert!(!s.release_lock());
    assert_eq!(store.state().queues(GROUPS).dumpers, 0);
}

#[test]
fn second_lock_is_misuse() {
    let store = ephemeral();
    let mut s = store.session("a");
    s.open_dump_lock(&[USERS]).unwrap();
    let err = s.open_read_lock(&[USERS]).unwrap_err();
    assert!(matches!(err, StoreError::LockHeld(LockKind::Dump)));
    assert!(err.is_misuse());
}

#[test]
fn unknown_base_is_rejected() {
    let store = ephemeral();
    let mut s = store.session("a");
    assert!(s.open_read_lock(&[BaseId(42)]).is_err());
    assert_eq!(s.lock_kind(), None);
}
