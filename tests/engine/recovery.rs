//! Recovery Tests
//!
//! Committed transactions survive reopening: through the journal, through
//! a dump, or both. A failed journal write leaves the store unchanged.

use crate::common::*;
use dirstore_durability::{scan_file, FileSink, JournalSink};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};

#[derive(Debug)]
struct FailingSink;

impl JournalSink for FailingSink {
    fn position(&mut self) -> io::Result<u64> {
        Ok(0)
    }

    fn append(&mut self, _frame: &[u8]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "disk full"))
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn truncate(&mut self, _len: u64) -> io::Result<()> {
        Ok(())
    }
}

/// Writes through to the journal file but never reaches stable storage
#[derive(Debug)]
struct NoSyncSink(FileSink);

impl JournalSink for NoSyncSink {
    fn position(&mut self) -> io::Result<u64> {
        self.0.position()
    }

    fn append(&mut self, frame: &[u8]) -> io::Result<()> {
        self.0.append(frame)
    }

    fn sync(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "fsync failed"))
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.0.truncate(len)
    }
}

// ============================================================================
// Journal replay
// ============================================================================

#[test]
fn reopen_replays_journal() {
    let mut t = TestStore::new();
    let (bob, carol) = {
        let mut s = t.store.session("admin");
        let _alice = create_user(&mut s, "alice", 1);
        let bob = create_user(&mut s, "bob", 2);
        let carol = create_user(&mut s, "carol", 3);

        s.open_read_lock(&[USERS]).unwrap();
        s.open_transaction().unwrap();
        s.edit_object(bob).unwrap().ready().unwrap().set("uid", 20).unwrap();
        s.delete_object(carol).unwrap();
        s.commit().unwrap();
        (bob, carol)
    };
    let before: Vec<StoredObject> = t
        .store
        .bases()
        .require(USERS)
        .unwrap()
        .objects()
        .iter()
        .map(|o| (**o).clone())
        .collect();

    t.reopen();
    let recovery = t.store.recovery();
    assert_eq!(recovery.objects_loaded, 0);
    assert_eq!(recovery.frames_applied, 4);
    assert_eq!(recovery.records_applied, 5);
    assert!(!recovery.discarded_tail);

    let users = t.store.bases().require(USERS).unwrap();
    let after: Vec<StoredObject> = users.objects().iter().map(|o| (**o).clone()).collect();
    assert_eq!(after, before);
    assert_eq!(users.max_id(), carol.id());
    assert_eq!(
        t.store.bases().resolve(bob).unwrap().get_scalar(UID),
        Some(&Value::Int(20))
    );

    // Reservations came back with the objects
    let mut s = t.store.session("admin");
    s.open_transaction().unwrap();
    s.create_object(USERS).unwrap().set("username", "ALICE").unwrap();
    assert!(matches!(
        s.commit(),
        Err(StoreError::NamespaceConflict(_))
    ));
}

#[test]
fn deleted_top_id_is_not_reused() {
    let mut t = TestStore::new();
    {
        let mut s = t.store.session("admin");
        create_user(&mut s, "dave", 1);
        let erin = create_user(&mut s, "erin", 2);
        s.open_read_lock(&[USERS]).unwrap();
        s.open_transaction().unwrap();
        s.delete_object(erin).unwrap();
        s.commit().unwrap();
    }
    t.reopen();
    let mut s = t.store.session("admin");
    let next = create_user(&mut s, "frank", 3);
    assert_eq!(next, Invid::new(USERS, ObjectId(3)));
}

#[test]
fn strict_mode_round_trip() {
    let mut t = TestStore::strict();
    assert_eq!(t.store.durability_mode(), DurabilityMode::Strict);
    {
        let mut s = t.store.session("admin");
        create_user(&mut s, "grace", 1);
    }
    t.reopen();
    assert_eq!(usernames(&t.store), vec!["grace"]);
}

#[test]
fn torn_tail_is_discarded() {
    let mut t = TestStore::new();
    {
        let mut s = t.store.session("admin");
        create_user(&mut s, "heidi", 1);
        create_user(&mut s, "ivan", 2);
    }
    let valid = fs::metadata(t.journal_path()).unwrap().len();

    // Half of a third frame
    let frame = {
        let scan = scan_file(&t.journal_path()).unwrap();
        let last = scan.frames.last().unwrap();
        let records: Vec<_> = last.records.iter().map(|r| r.as_ref()).collect();
        dirstore_durability::journal::encode_frame(last.timestamp_millis, &records).unwrap()
    };
    let mut file = OpenOptions::new().append(true).open(t.journal_path()).unwrap();
    file.write_all(&frame[..frame.len() / 2]).unwrap();
    drop(file);

    t.reopen();
    assert!(t.store.recovery().discarded_tail);
    assert_eq!(t.store.recovery().frames_applied, 2);
    assert_eq!(usernames(&t.store), vec!["heidi", "ivan"]);
    assert_eq!(fs::metadata(t.journal_path()).unwrap().len(), valid);
}

// ============================================================================
// Dumps
// ============================================================================

#[test]
fn close_dumps_and_resets_journal() {
    let mut t = TestStore::new();
    {
        let mut s = t.store.session("admin");
        create_user(&mut s, "judy", 1);
        create_user(&mut s, "ken", 2);
    }
    t.store.close().unwrap();
    assert!(t.dump_path().exists());
    assert_eq!(scan_file(&t.journal_path()).unwrap().frames.len(), 0);

    t.reopen();
    assert_eq!(
        t.store.recovery(),
        &RecoverySummary {
            objects_loaded: 2,
            ..RecoverySummary::default()
        }
    );
    assert_eq!(usernames(&t.store), vec!["judy", "ken"]);
}

#[test]
fn dump_plus_journal() {
    let mut t = TestStore::new();
    {
        let mut s = t.store.session("admin");
        create_user(&mut s, "leo", 1);
        assert_eq!(t.store.dump().unwrap(), 1);
        create_user(&mut s, "mallory", 2);
    }
    t.reopen();
    let recovery = t.store.recovery();
    assert_eq!(recovery.objects_loaded, 1);
    assert_eq!(recovery.frames_applied, 1);
    assert_eq!(usernames(&t.store), vec!["leo", "mallory"]);
}

#[test]
fn dump_waits_for_writer() {
    let t = TestStore::new();
    let mut writer = t.store.session("writer");
    writer.open_write_lock(&[USERS]).unwrap();

    let store = t.store.clone();
    let (tx, rx) = std::sync::mpsc::channel();
    let handle = std::thread::spawn(move || {
        tx.send(store.dump().is_ok()).unwrap();
    });
    assert!(rx
        .recv_timeout(std::time::Duration::from_millis(100))
        .is_err());

    writer.release_lock();
    assert!(rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap());
    handle.join().unwrap();
}

// ============================================================================
// Journal failure
// ============================================================================

#[test]
fn failed_journal_write_changes_nothing() {
    let mut t = TestStore::new();
    {
        let mut s = t.store.session("admin");
        create_user(&mut s, "niaj", 1);

        let niaj = t.store.bases().require(USERS).unwrap().objects()[0].invid();

        let original = t.store.swap_journal_sink(Box::new(FailingSink)).unwrap();
        s.open_read_lock(&[USERS]).unwrap();
        s.open_transaction().unwrap();
        s.edit_object(niaj).unwrap().ready().unwrap().set("uid", 11).unwrap();
        s.create_object(GROUPS).unwrap().set("name", "ops").unwrap();
        s.create_object(USERS).unwrap().set("username", "olivia").unwrap();
        let err = s.commit().unwrap_err();
        assert!(err.is_durability());

        // Neither base shows any part of the transaction
        assert!(s.in_transaction());
        assert_eq!(usernames(&t.store), vec!["niaj"]);
        assert!(t.store.bases().require(GROUPS).unwrap().is_empty());
        assert_eq!(
            t.store.bases().resolve(niaj).unwrap().get_scalar(UID),
            Some(&Value::Int(1))
        );
        assert_eq!(t.store.state().queues(GROUPS).writers, 0);
        assert!(t
            .store
            .namespaces()
            .holder("usernames", &Value::from("olivia"))
            .is_none());
        assert_eq!(t.store.state().queues(USERS).writers, 0);

        // Put the file back; the same transaction now commits
        t.store.swap_journal_sink(original);
        s.commit().unwrap();
    }
    t.reopen();
    assert_eq!(usernames(&t.store), vec!["niaj", "olivia"]);
    assert_eq!(t.store.bases().require(GROUPS).unwrap().len(), 1);
}

#[test]
fn failed_sync_is_not_replayed() {
    let mut t = TestStore::strict();
    {
        let mut s = t.store.session("admin");
        create_user(&mut s, "quentin", 1);
        let len = fs::metadata(t.journal_path()).unwrap().len();

        let sink = NoSyncSink(FileSink::open(&t.journal_path()).unwrap());
        let original = t.store.swap_journal_sink(Box::new(sink)).unwrap();
        s.open_transaction().unwrap();
        s.create_object(USERS).unwrap().set("username", "ghost").unwrap();
        assert!(s.commit().unwrap_err().is_durability());
        assert_eq!(fs::metadata(t.journal_path()).unwrap().len(), len);

        s.abort().unwrap();
        assert_eq!(usernames(&t.store), vec!["quentin"]);
        t.store.swap_journal_sink(original);
    }
    t.reopen();
    assert_eq!(t.store.recovery().frames_applied, 1);
    assert_eq!(usernames(&t.store), vec!["quentin"]);
}

#[test]
fn no_durability_keeps_nothing_on_disk() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig {
        path: Some(dir.path().to_path_buf()),
        durability: DurabilityMode::None,
        ..StoreConfig::default()
    };
    let store = StoreBuilder::from_config(config)
        .base(users_def())
        .namespace(NamespaceDef::case_insensitive("usernames"))
        .namespace(NamespaceDef::new("uids"))
        .open()
        .unwrap();
    assert!(!store.is_persistent());

    let mut s = store.session("admin");
    create_user(&mut s, "peggy", 1);
    assert!(store.swap_journal_sink(Box::new(FailingSink)).is_none());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}
