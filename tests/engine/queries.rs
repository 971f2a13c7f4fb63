//! Query Tests
//!
//! Queries evaluated through a session against live objects.

use crate::common::*;

fn populated() -> (Store, Invid) {
    let store = ephemeral();
    let mut s = store.session("admin");
    s.open_transaction().unwrap();
    let wheel = {
        let group = s.create_object(GROUPS).unwrap();
        group.set("name", "wheel").unwrap();
        group.set("gid", 10).unwrap();
        group.invid()
    };
    for (name, uid) in [("alice", 1000), ("bob", 1001), ("carol", 2000)] {
        let user = s.create_object(USERS).unwrap();
        user.set("username", name).unwrap();
        user.set("uid", uid).unwrap();
        if name != "bob" {
            user.push("groups", wheel).unwrap();
        }
    }
    s.commit().unwrap();
    (store, wheel)
}

fn run(store: &Store, query: &Query) -> Vec<String> {
    let mut s = store.session("reader");
    s.open_read_lock(&[query.base]).unwrap();
    s.live_objects(query.base)
        .unwrap()
        .iter()
        .filter(|o| s.matches(query, o))
        .filter_map(|o| o.get_scalar(USERNAME).map(|v| v.to_string()))
        .collect()
}

#[test]
fn compound_query() {
    let (store, _) = populated();
    let query = Query::new(
        USERS,
        QueryNode::data(DataNode::new(
            FieldSelector::Name("uid".into()),
            Comparator::Less,
            2000,
        ))
        .and(
            QueryNode::data(DataNode::new(
                FieldSelector::Name("username".into()),
                Comparator::StartsWith,
                "b",
            ))
            .not(),
        ),
    );
    dirstore::validate(&query, &users_def()).unwrap();
    assert_eq!(run(&store, &query), vec!["alice"]);
}

#[test]
fn contains_invid_by_label() {
    let (store, wheel) = populated();
    let by_invid = Query::new(
        USERS,
        QueryNode::data(DataNode::contains(
            FieldSelector::Id(MEMBER_OF),
            Comparator::Equals,
            wheel,
        )),
    );
    assert_eq!(run(&store, &by_invid), vec!["alice", "carol"]);

    let by_label = Query::new(
        USERS,
        QueryNode::data(DataNode::contains(
            FieldSelector::Id(MEMBER_OF),
            Comparator::Equals,
            "wheel",
        )),
    );
    assert_eq!(run(&store, &by_label), vec!["alice", "carol"]);
}

#[test]
fn regex_and_length() {
    let (store, _) = populated();
    let regex = Query::new(
        USERS,
        QueryNode::data(DataNode::new(
            FieldSelector::Label,
            Comparator::Matches,
            "^(a|c)",
        )),
    );
    assert_eq!(run(&store, &regex), vec!["alice", "carol"]);

    let no_groups = Query::new(
        USERS,
        QueryNode::data(DataNode::length(
            FieldSelector::Id(MEMBER_OF),
            ArrayOp::LengthLessEq,
            0,
        )),
    );
    // An undefined vector field never matches
    assert!(run(&store, &no_groups).is_empty());
}

#[test]
fn invalid_query_is_reported() {
    let query = Query::new(
        USERS,
        QueryNode::data(DataNode::new(
            FieldSelector::Name("uid".into()),
            Comparator::Matches,
            "(",
        )),
    );
    let err = dirstore::Error::from(dirstore::validate(&query, &users_def()).unwrap_err());
    assert!(matches!(err, dirstore::Error::InvalidQuery(_)));
    assert!(run(&ephemeral(), &query).is_empty());
}
