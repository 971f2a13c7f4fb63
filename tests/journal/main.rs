//! Journal Integration Tests
//!
//! Hand-built journal files replayed through a store: object ids, torn
//! tails, and the header checks that make startup fail.

#[path = "../common/mod.rs"]
mod common;

use common::*;
use dirstore_durability::codec::write_utf;
use dirstore_durability::journal::{encode_frame, encode_header};
use dirstore_durability::{scan_file, JournalError, RecordRef};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

fn user(id: i32, name: &str) -> StoredObject {
    let mut object = StoredObject::new(Invid::new(USERS, ObjectId(id)));
    object.set_unchecked(USERNAME, FieldValue::Scalar(Value::from(name)));
    object
}

fn write_journal(dir: &Path, frames: &[Vec<u8>]) {
    let mut bytes = encode_header(0).unwrap();
    for frame in frames {
        bytes.extend_from_slice(frame);
    }
    fs::write(dir.join("journal"), bytes).unwrap();
}

fn open(dir: &Path) -> dirstore::Result<Store> {
    Ok(builder().path(dir).open()?)
}

// ============================================================================
// Replay
// ============================================================================

#[test]
fn replayed_create_advances_max_id() {
    let dir = TempDir::new().unwrap();
    let five = user(5, "yvonne");
    write_journal(
        dir.path(),
        &[encode_frame(1_000, &[RecordRef::Create(&five)]).unwrap()],
    );

    let store = open(dir.path()).unwrap();
    assert_eq!(store.recovery().records_applied, 1);
    let users = store.bases().require(USERS).unwrap();
    assert_eq!(users.max_id(), ObjectId(5));
    assert_eq!(*store.bases().resolve(five.invid()).unwrap(), five);

    let mut s = store.session("admin");
    let next = create_user(&mut s, "zoe", 1);
    assert_eq!(next, Invid::new(USERS, ObjectId(6)));
}

#[test]
fn create_missing_last_byte_is_not_applied() {
    let dir = TempDir::new().unwrap();
    let five = user(5, "x");
    let frame = encode_frame(1_000, &[RecordRef::Create(&five)]).unwrap();
    write_journal(dir.path(), &[frame[..frame.len() - 1].to_vec()]);

    let store = open(dir.path()).unwrap();
    assert!(store.recovery().discarded_tail);
    assert_eq!(store.recovery().frames_applied, 0);
    assert!(store.bases().resolve(five.invid()).is_none());
    assert_eq!(store.bases().require(USERS).unwrap().max_id(), ObjectId(0));
    assert!(store
        .namespaces()
        .holder("usernames", &Value::from("x"))
        .is_none());
}

#[test]
fn frames_apply_in_order() {
    let dir = TempDir::new().unwrap();
    let first = user(1, "amy");
    let renamed = user(1, "amelia");
    let second = user(2, "bert");
    write_journal(
        dir.path(),
        &[
            encode_frame(1, &[RecordRef::Create(&first), RecordRef::Create(&second)]).unwrap(),
            encode_frame(2, &[RecordRef::Edit(&renamed)]).unwrap(),
            encode_frame(3, &[RecordRef::Delete(second.invid())]).unwrap(),
        ],
    );

    let store = open(dir.path()).unwrap();
    assert_eq!(store.recovery().frames_applied, 3);
    assert_eq!(usernames(&store), vec!["amelia"]);
    assert!(store
        .namespaces()
        .holder("usernames", &Value::from("amy"))
        .is_none());
    assert_eq!(store.bases().require(USERS).unwrap().max_id(), ObjectId(2));
}

#[test]
fn truncated_frame_is_discarded_and_journal_continues() {
    let dir = TempDir::new().unwrap();
    let kept = user(1, "carl");
    let lost = user(2, "dora");
    let good = encode_frame(1, &[RecordRef::Create(&kept)]).unwrap();
    let torn = encode_frame(2, &[RecordRef::Create(&lost)]).unwrap();
    write_journal(dir.path(), &[good, torn[..torn.len() - 3].to_vec()]);

    let store = open(dir.path()).unwrap();
    assert!(store.recovery().discarded_tail);
    assert_eq!(usernames(&store), vec!["carl"]);

    // New commits land after the last good frame
    {
        let mut s = store.session("admin");
        create_user(&mut s, "dora", 2);
    }
    drop(store);
    let scan = scan_file(&dir.path().join("journal")).unwrap();
    assert_eq!(scan.frames.len(), 2);
    assert!(!scan.discarded_tail());

    let store = open(dir.path()).unwrap();
    assert_eq!(usernames(&store), vec!["carl", "dora"]);
}

#[test]
fn garbage_after_frames_is_discarded() {
    let dir = TempDir::new().unwrap();
    let only = user(1, "ed");
    write_journal(
        dir.path(),
        &[encode_frame(1, &[RecordRef::Create(&only)]).unwrap()],
    );
    let mut file = OpenOptions::new()
        .append(true)
        .open(dir.path().join("journal"))
        .unwrap();
    file.write_all(b"\x00\x04open\x00\x00").unwrap();
    drop(file);

    let store = open(dir.path()).unwrap();
    assert!(store.recovery().discarded_tail);
    assert_eq!(store.recovery().frames_applied, 1);
}

// ============================================================================
// Fatal headers
// ============================================================================

#[test]
fn bad_magic_fails_open() {
    let dir = TempDir::new().unwrap();
    let mut bytes = Vec::new();
    write_utf(&mut bytes, "NotAJournal").unwrap();
    bytes.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0]);
    fs::write(dir.path().join("journal"), bytes).unwrap();

    let err = builder().path(dir.path()).open().unwrap_err();
    assert!(matches!(
        err,
        StoreError::Journal(JournalError::BadMagic { .. })
    ));
    assert!(dirstore::Error::from(err).is_serious());
}

#[test]
fn newer_major_version_fails_open() {
    let dir = TempDir::new().unwrap();
    let mut bytes = Vec::new();
    write_utf(&mut bytes, "GJournal").unwrap();
    bytes.extend_from_slice(&[0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    fs::write(dir.path().join("journal"), bytes).unwrap();

    assert!(matches!(
        open(dir.path()),
        Err(dirstore::Error::Corruption(_))
    ));
}

#[test]
fn unknown_base_fails_open() {
    let dir = TempDir::new().unwrap();
    let stray = StoredObject::new(Invid::new(BaseId(99), ObjectId(1)));
    write_journal(
        dir.path(),
        &[encode_frame(1, &[RecordRef::Create(&stray)]).unwrap()],
    );
    assert!(matches!(
        builder().path(dir.path()).open(),
        Err(StoreError::Journal(JournalError::UnknownBase(BaseId(99))))
    ));
}

#[test]
fn empty_file_gets_fresh_header() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("journal"), b"").unwrap();
    let store = open(dir.path()).unwrap();
    assert_eq!(store.recovery(), &RecoverySummary::default());
    let scan = scan_file(&dir.path().join("journal")).unwrap();
    assert_eq!((scan.header.major, scan.header.minor), (0, 1));
}
