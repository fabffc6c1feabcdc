//! Commit and rollback behaviour under injected backend failures.

use statekeep_core::{ChangeStatus, CoreError, ErrorKind, Manager};
use statekeep_storage::{Cache, Database, InMemoryCache};
use statekeep_testkit::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn statuses(manager: &Manager) -> Vec<ChangeStatus> {
    manager.status().iter().map(|c| c.status()).collect()
}

#[test]
fn every_backend_is_attempted() {
    init_tracing();
    let mut test = FaultyManager::new();
    test.database.faults().fail_always(FaultPoint::Insert);

    test.stage(&User::fixture(), "insert").unwrap();
    let err = test.commit().unwrap_err();
    assert_eq!(
        err,
        CoreError::CommitConflict {
            failed: 1,
            total: 1
        }
    );

    assert_eq!(test.cache.faults().calls(FaultPoint::Set), 1);
    assert!(test.cache.inner().contains(USERS, "1"));
    assert_eq!(statuses(&test), vec![ChangeStatus::Failure]);
}

#[test]
fn cache_failure_fails_the_change() {
    init_tracing();
    let mut test = FaultyManager::new();
    test.cache.faults().fail_always(FaultPoint::Set);

    test.stage(&User::fixture(), "insert").unwrap();
    test.commit().unwrap_err();

    assert!(test.database.inner().contains("users", "1"));
    let change = test.status()[0];
    assert_eq!(change.status(), ChangeStatus::Failure);
    assert_eq!(
        change.last_error().map(|e| e.to_string()),
        Some("backend error: injected set failure".to_string())
    );
    assert!(test.applied().is_empty());
}

#[test]
fn batch_continues_past_failures() {
    init_tracing();
    let mut test = FaultyManager::new();
    test.database.faults().fail_times(FaultPoint::Insert, 1);

    for id in ["1", "2", "3"] {
        test.stage(&User::new(id, "n", "e@x.com"), "insert").unwrap();
    }
    let err = test.commit().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(
        statuses(&test),
        vec![
            ChangeStatus::Failure,
            ChangeStatus::Success,
            ChangeStatus::Success
        ]
    );
    assert_eq!(test.applied().len(), 2);
    assert_eq!(test.database.faults().calls(FaultPoint::Insert), 3);
}

#[test]
fn retried_commit_skips_resolved_changes() {
    init_tracing();
    let mut test = FaultyManager::new();
    test.database.faults().fail_times(FaultPoint::Insert, 1);
    test.cache.faults().fail_times(FaultPoint::Set, 1);

    // both faults are spent on the first change
    test.stage(&User::new("1", "a", "a@x.com"), "insert").unwrap();
    test.stage(&User::new("2", "b", "b@x.com"), "insert").unwrap();
    test.commit().unwrap_err();
    assert_eq!(
        statuses(&test),
        vec![ChangeStatus::Failure, ChangeStatus::Success]
    );

    test.commit().unwrap();
    assert!(test.status().is_empty());
    // the successful change was not re-inserted
    assert_eq!(test.database.faults().calls(FaultPoint::Insert), 3);
    assert_eq!(test.applied().len(), 2);
    assert_eq!(test.database.inner().row_count("users"), Some(2));
}

#[test]
fn failed_revert_stays_applied_until_retried() {
    init_tracing();
    let mut test = FaultyManager::new();
    test.stage(&User::fixture(), "insert").unwrap();
    test.commit().unwrap();

    test.cache.faults().fail_times(FaultPoint::Delete, 1);
    let err = test.rollback().unwrap_err();
    assert_eq!(err, CoreError::RollbackConflict { failed: 1 });

    let applied = test.applied();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].status(), ChangeStatus::Success);
    assert!(applied[0].last_error().is_some());
    assert!(!test.database.inner().contains("users", "1"));

    test.rollback().unwrap();
    assert!(test.applied().is_empty());
    assert!(test.cache.inner().is_empty());
}

#[test]
fn offline_database_fails_reads_with_internal_kind() {
    init_tracing();
    let mut test = FaultyManager::new();
    seed(&mut test, &[User::fixture()]).unwrap();
    test.cache().unwrap().purge().unwrap();
    test.database.faults().set_offline(true);

    let mut found = User::default();
    let err = test.get(&mut found, "1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);

    let err = test.query_one(&mut found, "id = '1'").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);

    test.database.faults().heal_all();
    test.get(&mut found, "1").unwrap();
}

#[test]
fn cache_failure_falls_back_to_database() {
    init_tracing();
    let mut test = FaultyManager::new();
    seed(&mut test, &[User::fixture()]).unwrap();
    test.cache.faults().fail_always(FaultPoint::Get);

    let mut found = User::default();
    test.get(&mut found, "1").unwrap();
    assert_eq!(found, User::fixture());
    assert_eq!(test.database.faults().calls(FaultPoint::Get), 1);
}

#[test]
fn configured_ttl_reaches_the_cache() {
    init_tracing();
    let cache = Arc::new(InMemoryCache::new());
    let config = statekeep_core::Config::new().cache_ttl(Duration::from_millis(5));
    let mut manager =
        Manager::with_config(Some(test_database()), Some(cache.clone()), config).unwrap();

    seed(&mut manager, &[User::fixture()]).unwrap();
    assert_eq!(cache.ttl(), Duration::from_millis(5));
    std::thread::sleep(Duration::from_millis(30));
    assert!(cache.is_empty());

    // expired cache entry, database still answers
    let mut found = User::default();
    manager.get(&mut found, "1").unwrap();
    assert_eq!(found, User::fixture());
}

#[test]
fn unbounded_ttl_commits_and_never_expires() {
    init_tracing();
    let cache = Arc::new(InMemoryCache::new());
    let config = statekeep_core::Config::new().cache_ttl(Duration::MAX);
    let mut manager = Manager::with_config(None, Some(cache.clone()), config).unwrap();

    seed(&mut manager, &[User::fixture()]).unwrap();
    assert!(cache.contains(USERS, "1"));

    let mut found = User::default();
    manager.get(&mut found, "1").unwrap();
    assert_eq!(found, User::fixture());
}

#[test]
fn rejected_ttl_fails_construction() {
    init_tracing();
    let cache = Arc::new(FaultyCache::new(InMemoryCache::new()));
    cache.faults().fail_always(FaultPoint::SetTtl);
    let config = statekeep_core::Config::new().cache_ttl(Duration::from_secs(1));

    let err = Manager::with_config(None, Some(cache as Arc<dyn Cache>), config).unwrap_err();
    assert!(matches!(err, CoreError::Store { op: "configure", .. }));
}

#[test]
fn unsupported_reverts_are_not_failures() {
    init_tracing();
    let mut test = FaultyManager::new();
    test.database
        .insert(&User::new("2", "old", "old@x.com"))
        .unwrap();
    test.stage(&User::new("2", "new", "new@x.com"), "update")
        .unwrap();
    test.stage(&User::new("2", "new", "new@x.com"), "delete")
        .unwrap();
    test.commit().unwrap();

    test.rollback().unwrap();
    assert_eq!(test.applied().len(), 2);
    assert_eq!(test.database.faults().calls(FaultPoint::Delete), 1);
}
