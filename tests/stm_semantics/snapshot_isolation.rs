//! Snapshot isolation: a transaction reads the state as of its read-version

use crate::common::*;
use mvstm::prelude::*;

#[test]
fn test_reader_keeps_snapshot_across_concurrent_commit() {
    let stm = stm();
    let a = commit_new(&stm, 1i64);
    let b = commit_new(&stm, 1i64);

    let mut reader = stm.start_readonly_transaction("reader");
    assert_eq!(reader.read(&a).unwrap(), 1);

    let mut writer = stm.start_update_transaction("writer");
    writer.write(&a, 2).unwrap();
    writer.write(&b, 2).unwrap();
    writer.commit().unwrap();

    // b was not loaded before the commit, yet the reader still sees the
    // value consistent with its snapshot
    assert_eq!(reader.read(&b).unwrap(), 1);
    assert_eq!(reader.read(&a).unwrap(), 1);
    reader.commit().unwrap();

    assert_eq!(read_committed(&stm, &b), 2);
}

#[test]
fn test_update_transaction_reads_its_own_writes() {
    let stm = stm();
    let a = commit_new(&stm, String::from("x"));

    let mut txn = stm.start_update_transaction("own");
    txn.modify(&a, |s| s.push('y')).unwrap();
    assert_eq!(txn.read(&a).unwrap(), "xy");
    assert_eq!(read_committed(&stm, &a), "x");
    txn.commit().unwrap();
    assert_eq!(read_committed(&stm, &a), "xy");
}

#[test]
fn test_single_version_history_fails_old_snapshot() {
    init_tracing();
    let stm = Stm::builder().history_depth(1).build().unwrap();
    let a = commit_new(&stm, 0u32);

    let mut reader = stm.start_readonly_transaction("old");
    commit_write(&stm, &a, 1);

    let err = reader.read(&a).unwrap_err();
    assert!(matches!(err, StmError::LoadTooOldVersion { .. }));
    assert!(err.is_recoverable());
    assert_eq!(stm.statistics().load_failures, 1);
}

#[test]
fn test_bounded_history_serves_recent_snapshots() {
    init_tracing();
    let stm = Stm::builder().history_depth(3).build().unwrap();
    let a = commit_new(&stm, 0u32);

    let mut reader = stm.start_readonly_transaction("recent");
    commit_write(&stm, &a, 1);
    commit_write(&stm, &a, 2);
    assert_eq!(reader.read(&a).unwrap(), 0);

    let mut stale = stm.start_readonly_transaction("stale");
    for v in 3..=6 {
        commit_write(&stm, &a, v);
    }
    assert!(stale.read(&a).is_err());
}

#[test]
fn test_readonly_commit_does_not_advance_clock() {
    let stm = stm();
    let a = commit_new(&stm, 5u8);
    let before = stm.current_version();

    let mut txn = stm.start_readonly_transaction("ro");
    txn.read(&a).unwrap();
    assert_eq!(txn.commit().unwrap(), before);
    assert_eq!(stm.current_version(), before);
    assert_eq!(stm.statistics().readonly_commits, 1);
}

#[test]
fn test_fresh_object_invisible_until_commit() {
    let stm = stm();
    let mut creator = stm.start_update_transaction("creator");
    let handle = creator.attach_new(Tranlocal::fresh(1i32)).unwrap();

    assert!(matches!(
        handle.atomic_get(),
        Err(StmError::NoCommittedDataFound { .. })
    ));
    let mut other = stm.start_update_transaction("other");
    assert!(matches!(
        other.read(&handle),
        Err(StmError::LoadUncommitted { .. })
    ));

    creator.commit().unwrap();
    assert_eq!(read_committed(&stm, &handle), 1);
}
