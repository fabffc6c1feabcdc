//! End-to-end manager scenarios over in-memory backends.

use statekeep_core::{ChangeStatus, CoreError, ErrorKind, Manager, Operation};
use statekeep_storage::{Cache, Database};
use statekeep_testkit::prelude::*;
use std::sync::Arc;

#[test]
fn manager_needs_at_least_one_backend() {
    init_tracing();
    let db: Arc<dyn Database> = test_database();
    let cache: Arc<dyn Cache> = test_cache();

    assert!(Manager::new(Some(db.clone()), None).is_ok());
    assert!(Manager::new(None, Some(cache.clone())).is_ok());
    assert!(Manager::new(Some(db), Some(cache)).is_ok());

    let err = Manager::new(None, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid);
}

#[test]
fn stage_every_operation() {
    init_tracing();
    let mut test = TestManager::full();
    let mut user = User::new("1", "Franco", "franco@gmail.com");

    test.stage(&user, "insert").unwrap();
    user.email = "franco.new@gmail.com".into();
    test.stage(&user, "update").unwrap();
    test.stage(&user, "delete").unwrap();

    let staged = test.status();
    assert_eq!(staged.len(), 3);
    assert!(staged.iter().all(|c| c.status() == ChangeStatus::Pending));
    assert_eq!(test.db().row_count("users"), Some(0));
}

#[test]
fn commit_insert_update_delete() {
    init_tracing();
    let mut test = TestManager::full();
    let mut user = User::new("1", "Franco", "franco@gmail.com");

    test.stage(&user, "insert").unwrap();
    test.commit().unwrap();
    assert!(test.status().is_empty());

    user.name = "Not Franco".into();
    test.stage(&user, "update").unwrap();
    test.commit().unwrap();
    let mut found = User::default();
    test.get(&mut found, "1").unwrap();
    assert_eq!(found.name, "Not Franco");

    test.stage(&user, "delete").unwrap();
    test.commit().unwrap();
    assert!(!test.db().contains("users", "1"));
    assert!(test.kv().is_empty());
}

#[test]
fn rollback_after_partial_failure() {
    init_tracing();
    let mut test = TestManager::full();
    let user1 = User::new("1", "Franco", "franco@gmail.com");
    let book = Book::new("1", "El master fuster", "Franco");

    test.stage(&user1, "insert").unwrap();
    test.stage(&book, "insert").unwrap();

    let err = test.commit().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(test.applied().len(), 1);
    assert_eq!(test.status().len(), 2);

    test.rollback().unwrap();
    assert!(test.applied().is_empty());
    assert_eq!(test.status().len(), 2);
    assert!(!test.db().contains("users", "1"));

    test.clear();
    assert!(test.status().is_empty());

    let user2 = User::new("2", "Juan", "juan@gmail.com");
    let user3 = User::new("3", "Xin", "xin@gmail.com");
    test.stage(&user2, "insert").unwrap();
    test.stage(&user3, "insert").unwrap();
    test.commit().unwrap();
    assert_eq!(test.applied().len(), 2);

    test.rollback().unwrap();
    assert!(test.status().is_empty());
    assert!(test.applied().is_empty());
    assert_eq!(test.db().row_count("users"), Some(0));
    assert!(test.kv().is_empty());
}

#[test]
fn failed_book_insert_is_recorded_on_the_change() {
    init_tracing();
    let mut test = TestManager::full();
    test.stage(&Book::new("1", "El master fuster", "Franco"), "insert")
        .unwrap();
    test.commit().unwrap_err();

    let staged = test.status();
    assert_eq!(staged[0].status(), ChangeStatus::Failure);
    assert_eq!(
        staged[0].last_error().map(|e| e.kind()),
        Some(ErrorKind::Internal)
    );
    // the cache accepted the book even though the database did not
    assert!(test.kv().contains(BOOKS, "1"));
}

#[test]
fn get_reads_through_to_database() {
    init_tracing();
    let mut test = TestManager::full();
    let user1 = User::new("1", "Franco", "franco@gmail.com");
    seed(&mut test, &[user1.clone()]).unwrap();
    test.cache().unwrap().purge().unwrap();

    let mut found = User::default();
    test.get(&mut found, "1").unwrap();
    assert_eq!(found, user1);

    let mut missing = User::default();
    let err = test.get(&mut missing, "31231").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn get_prefers_cache() {
    init_tracing();
    let test = TestManager::full();
    test.db()
        .insert(&User::new("1", "From DB", "db@x.com"))
        .unwrap();
    test.kv()
        .set(&User::new("1", "From cache", "cache@x.com"), test.kv().ttl())
        .unwrap();

    let mut found = User::default();
    test.get(&mut found, "1").unwrap();
    assert_eq!(found.name, "From cache");
}

#[test]
fn query_one_matches_exactly_one() {
    init_tracing();
    let mut test = TestManager::full();
    let user1 = User::new("1", "Franco", "franco@gmail.com");
    seed(&mut test, &[user1.clone()]).unwrap();

    let mut found = User::default();
    test.query_one(&mut found, "email = 'franco@gmail.com'")
        .unwrap();
    assert_eq!(found, user1);

    let err = test
        .query_one(&mut User::default(), "email = 'arcano@gmail.com'")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let impostor = User::new("2", "Franco's Impostor", "franco@gmail.com");
    seed(&mut test, &[impostor]).unwrap();
    let err = test
        .query_one(&mut User::default(), "email = 'franco@gmail.com'")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    test.query_one(&mut found, "name = 'Franco''s Impostor'")
        .unwrap();
    assert_eq!(found.id, "2");
}

#[test]
fn query_with_limit_offset_and_order() {
    init_tracing();
    let mut test = TestManager::full();
    let [user1, user2, _] = query_users();
    seed(&mut test, &query_users()).unwrap();

    let template = User::default();
    let mut results = Vec::new();
    test.query(&mut results, &template, &["name = 'Franco'"])
        .unwrap();
    assert_eq!(results, vec![user1.clone(), user2.clone()]);

    let mut results = Vec::new();
    let err = test
        .query(&mut results, &template, &["name = 'Francisco'"])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    test.query(&mut results, &template, &["name = 'Franco'", "1"])
        .unwrap();
    assert_eq!(results, vec![user1]);

    test.query(&mut results, &template, &["name = 'Franco'", "1", "1"])
        .unwrap();
    assert_eq!(results, vec![user2.clone()]);

    test.query(
        &mut results,
        &template,
        &["name = 'Franco' ORDER BY email DESC", "1"],
    )
    .unwrap();
    assert_eq!(results, vec![user2]);
}

#[test]
fn query_rejects_bad_parts() {
    init_tracing();
    let mut test = TestManager::full();
    seed(&mut test, &query_users()).unwrap();
    let mut results: Vec<User> = Vec::new();

    for parts in [
        vec![],
        vec!["name = 'Franco'", "1", "1", "1"],
        vec!["name = 'Franco'", "one"],
        vec!["name = "],
    ] {
        let err = test
            .query(&mut results, &User::default(), &parts)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid, "{parts:?}");
    }
}

#[test]
fn database_only_manager() {
    init_tracing();
    let mut test = TestManager::database_only();
    let user = User::fixture();
    seed(&mut test, &[user.clone()]).unwrap();

    let mut found = User::default();
    test.get(&mut found, "1").unwrap();
    assert_eq!(found, user);

    let err = test.get(&mut User::default(), "missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    test.rollback().unwrap();
    let err = test.get(&mut found, "1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn cache_only_manager() {
    init_tracing();
    let mut test = TestManager::cache_only();
    let user = User::fixture();
    seed(&mut test, &[user.clone()]).unwrap();

    let mut found = User::default();
    test.get(&mut found, "1").unwrap();
    assert_eq!(found, user);

    let err = test.get(&mut User::default(), "missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // books have no collection to miss in a cache
    seed(&mut test, &[Book::new("1", "Dune", "Herbert")]).unwrap();
    assert_eq!(test.kv().len(), 2);

    let err = test
        .query_one(&mut found, "name = 'Mock'")
        .unwrap_err();
    assert_eq!(err, CoreError::NoDatabase { op: "query_one" });
}

#[test]
fn typed_operations_and_mixed_case_names() {
    init_tracing();
    let mut test = TestManager::full();
    test.stage(&User::fixture(), Operation::Insert).unwrap();
    test.stage(&User::fixture(), "UPDATE").unwrap();
    test.stage(&User::fixture(), "Delete").unwrap();
    test.commit().unwrap();

    let ops: Vec<_> = test.applied().iter().map(|c| c.operation()).collect();
    assert_eq!(ops, Operation::ALL.to_vec());
    assert_eq!(test.db().row_count("users"), Some(0));
}

#[test]
fn log_status_lists_staged_changes() {
    init_tracing();
    let mut test = TestManager::full();
    test.stage(&User::fixture(), "insert").unwrap();
    test.log_status();
    assert_eq!(
        test.status()[0].to_string(),
        "change:1 insert users/1 [pending]"
    );
}
