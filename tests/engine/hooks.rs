//! Hook Tests
//!
//! Per-type hooks label objects, initialize new ones, veto commits and
//! observe installed changes.

use crate::common::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct UserHook {
    committed: AtomicUsize,
}

impl ObjectHook for UserHook {
    fn label(&self, object: &StoredObject) -> Option<String> {
        object
            .get_scalar(USERNAME)
            .map(|name| format!("user:{}", name))
    }

    fn initialize_new(&self, shadow: &mut ShadowObject) {
        shadow.set("uid", 65534).unwrap();
    }

    fn commit_phase1(&self, shadow: &ShadowObject) -> std::result::Result<(), String> {
        match shadow.get_scalar("username") {
            Some(name) if name.as_str() == Some("root") => Err("reserved name".to_string()),
            _ => Ok(()),
        }
    }

    fn commit_phase2(&self, _shadow: &ShadowObject) {
        self.committed.fetch_add(1, Ordering::SeqCst);
    }
}

fn hooked() -> (Store, Arc<UserHook>) {
    let hook = Arc::new(UserHook::default());
    let store = builder()
        .ephemeral()
        .hook(USERS, hook.clone())
        .open()
        .unwrap();
    (store, hook)
}

#[test]
fn new_objects_are_initialized() {
    let (store, _) = hooked();
    let mut s = store.session("a");
    s.open_transaction().unwrap();
    let shadow = s.create_object(USERS).unwrap();
    assert_eq!(shadow.get_scalar("uid"), Some(&Value::Int(65534)));
}

#[test]
fn phase1_veto_keeps_transaction_open() {
    let (store, hook) = hooked();
    let mut s = store.session("a");
    s.open_transaction().unwrap();
    let invid = {
        let shadow = s.create_object(USERS).unwrap();
        shadow.set("username", "root").unwrap();
        shadow.invid()
    };

    match s.commit() {
        Err(StoreError::HookRejected { invid: who, reason }) => {
            assert_eq!(who, invid);
            assert_eq!(reason, "reserved name");
        }
        other => panic!("expected veto, got {:?}", other),
    }
    assert!(s.in_transaction());
    assert!(usernames(&store).is_empty());
    assert_eq!(hook.committed.load(Ordering::SeqCst), 0);
    // Nothing was reserved by the failed attempt
    assert!(store
        .namespaces()
        .holder("usernames", &Value::from("root"))
        .is_none());

    s.rollback("none").unwrap();
    s.abort().unwrap();
}

#[test]
fn phase2_sees_every_installed_object() {
    let (store, hook) = hooked();
    let mut s = store.session("a");
    s.open_transaction().unwrap();
    for (name, uid) in [("trent", 1), ("victor", 2)] {
        let user = s.create_object(USERS).unwrap();
        user.set("username", name).unwrap();
        user.set("uid", uid).unwrap();
    }
    s.commit().unwrap();
    assert_eq!(hook.committed.load(Ordering::SeqCst), 2);
}

#[test]
fn hook_label_overrides_label_field() {
    let (store, _) = hooked();
    let mut s = store.session("a");
    s.open_transaction().unwrap();
    s.create_object(USERS).unwrap().set("username", "walter").unwrap();
    s.commit().unwrap();

    let query = Query::new(
        USERS,
        QueryNode::data(DataNode::new(
            FieldSelector::Label,
            Comparator::Equals,
            "user:walter",
        )),
    );
    s.open_read_lock(&[USERS]).unwrap();
    let all = s.live_objects(USERS).unwrap();
    assert_eq!(all.iter().filter(|o| s.matches(&query, o)).count(), 1);
}

#[test]
fn hook_swapped_in_schema_edit() {
    let store = builder().ephemeral().open().unwrap();
    let hook = Arc::new(UserHook::default());
    {
        let edit = store.begin_schema_edit();
        assert!(edit.swap_hook(USERS, hook.clone()).unwrap().is_none());
        edit.finish();
    }
    assert!(store.hooks().is_registered(USERS));

    let mut s = store.session("a");
    create_user(&mut s, "xavier", 1);
    assert_eq!(hook.committed.load(Ordering::SeqCst), 1);
}
