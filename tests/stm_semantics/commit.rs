//! Commit atomicity, conflict detection and lock hygiene

use crate::common::*;
use mvstm::prelude::*;
use mvstm::{DirtinessStatus, TxnId};
use proptest::prelude::*;

#[test]
fn test_at_most_one_writer_wins() {
    let stm = stm();
    let a = commit_new(&stm, 0i64);

    let mut first = stm.start_update_transaction("first");
    let mut second = stm.start_update_transaction("second");
    first.write(&a, 1).unwrap();
    second.write(&a, 2).unwrap();

    first.commit().unwrap();
    let err = second.commit().unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(second.status(), TransactionStatus::Aborted);
    assert_eq!(read_committed(&stm, &a), 1);
}

#[test]
fn test_failed_commit_releases_every_lock() {
    let stm = stm();
    let handles: Vec<_> = (0..5).map(|i| commit_new(&stm, i)).collect();

    let mut loser = stm.start_update_transaction("loser");
    for h in &handles {
        loser.modify(h, |v| *v += 10).unwrap();
    }
    let created = loser.attach_new(Tranlocal::fresh(99)).unwrap();

    commit_write(&stm, &handles[2], -1);
    assert!(loser.commit().unwrap_err().is_conflict());

    for h in &handles {
        assert_eq!(h.lock_owner(), None);
    }
    assert_eq!(created.lock_owner(), None);
    assert!(created.atomic_get().is_err());
    assert_eq!(read_committed(&stm, &handles[0]), 0);
}

#[test]
fn test_lock_contention_fails_without_side_effects() {
    init_tracing();
    let stm = Stm::builder().fail_fast().build().unwrap();
    let a = commit_new(&stm, 0u64);
    let b = commit_new(&stm, 0u64);

    let mut txn = stm.start_update_transaction("blocked");
    txn.write(&a, 1).unwrap();
    txn.write(&b, 1).unwrap();

    let squatter = TxnId::new(u64::MAX);
    assert!(b.try_lock(squatter));
    let before = stm.current_version();

    let err = txn.commit().unwrap_err();
    assert!(matches!(err, StmError::FailedToObtainLocks { .. }));
    assert!(err.is_recoverable());
    assert_eq!(stm.current_version(), before);
    assert_eq!(a.lock_owner(), None);
    assert_eq!(b.lock_owner(), Some(squatter));
    assert_eq!(stm.statistics().lock_failures, 1);

    b.release_lock(squatter);
    assert_eq!(read_committed(&stm, &a), 0);
}

#[test]
fn test_empty_commit_has_no_side_effects() {
    let stm = stm();
    let a = commit_new(&stm, 7i32);
    let before = stm.current_version();
    let latest = a.latest_version();

    let mut txn = stm.start_update_transaction("noop");
    assert_eq!(txn.read(&a).unwrap(), 7);
    assert_eq!(txn.commit().unwrap(), before);

    assert_eq!(stm.current_version(), before);
    assert_eq!(a.latest_version(), latest);
    let stats = stm.statistics();
    assert_eq!(stats.empty_commits, 1);
    assert_eq!(stats.committed, 1);
}

/// Changing a value and changing it back is indistinguishable from not
/// changing it: such a transaction writes nothing and cannot conflict.
#[test]
fn test_change_and_revert_writes_nothing() {
    let stm = stm();
    let a = commit_new(&stm, 1i32);

    let mut txn = stm.start_update_transaction("aba");
    txn.write(&a, 2).unwrap();
    txn.write(&a, 1).unwrap();
    assert_eq!(txn.load(&a).unwrap().dirtiness_status(), DirtinessStatus::Clean);

    // a concurrent commit to the same object does not fail the ABA writer
    commit_write(&stm, &a, 5);
    txn.commit().unwrap();
    assert_eq!(read_committed(&stm, &a), 5);
}

/// A → B → A inside one transaction publishes nothing, so a concurrent
/// writer that read A never learns about it.
#[test]
fn test_aba_within_one_commit_is_not_detected() {
    let stm = stm();
    let a = commit_new(&stm, 1i32);
    let latest = a.latest_version();

    let mut writer = stm.start_update_transaction("writer");
    assert_eq!(writer.read(&a).unwrap(), 1);
    writer.write(&a, 10).unwrap();

    let mut aba = stm.start_update_transaction("aba");
    aba.write(&a, 2).unwrap();
    aba.write(&a, 1).unwrap();
    let aba_version = aba.commit().unwrap();
    assert_eq!(aba_version, aba.read_version());
    assert_eq!(a.latest_version(), latest);

    writer.commit().unwrap();
    assert_eq!(read_committed(&stm, &a), 10);
}

/// A → B and B → A as separate commits advance the version: the value is
/// back to A but a writer that read the first A conflicts.
#[test]
fn test_aba_across_commits_conflicts() {
    let stm = stm();
    let a = commit_new(&stm, 1i32);

    let mut writer = stm.start_update_transaction("writer");
    assert_eq!(writer.read(&a).unwrap(), 1);
    writer.write(&a, 10).unwrap();

    commit_write(&stm, &a, 2);
    commit_write(&stm, &a, 1);
    assert_eq!(read_committed(&stm, &a), 1);

    let err = writer.commit().unwrap_err();
    assert!(matches!(err, StmError::WriteConflict { .. }));
    assert_eq!(read_committed(&stm, &a), 1);
}

#[test]
fn test_disjoint_writers_both_commit() {
    let stm = stm();
    let a = commit_new(&stm, 0i32);
    let b = commit_new(&stm, 0i32);

    let mut left = stm.start_update_transaction("left");
    let mut right = stm.start_update_transaction("right");
    left.write(&a, 1).unwrap();
    right.write(&b, 1).unwrap();

    let v1 = left.commit().unwrap();
    let v2 = right.commit().unwrap();
    assert_eq!(v2, v1 + 1);
    assert_eq!(read_committed(&stm, &a), 1);
    assert_eq!(read_committed(&stm, &b), 1);
}

#[test]
fn test_terminal_transaction_is_dead() {
    let stm = stm();
    let a = commit_new(&stm, 0i32);

    let mut txn = stm.start_update_transaction("dead");
    txn.write(&a, 1).unwrap();
    let version = txn.commit().unwrap();
    assert_eq!(txn.commit().unwrap(), version);
    assert_eq!(txn.commit_version(), Some(version));

    for err in [
        txn.abort().unwrap_err(),
        txn.read(&a).unwrap_err(),
        txn.start_or().unwrap_err(),
        txn.abort_and_retry().unwrap_err(),
    ] {
        assert!(matches!(err, StmError::DeadTransaction { .. }), "{err}");
        assert!(err.is_misuse());
    }
}

#[test]
fn test_one_clock_tick_per_commit() {
    let stm = stm();
    let handles: Vec<_> = (0..10).map(|i| commit_new(&stm, i)).collect();
    let before = stm.current_version();

    let mut txn = stm.start_update_transaction("many");
    for h in &handles {
        txn.modify(h, |v| *v += 1).unwrap();
    }
    let version = txn.commit().unwrap();

    assert_eq!(version, before + 1);
    for h in &handles {
        assert_eq!(h.latest_version(), Some(version));
    }
}

proptest! {
    #[test]
    fn prop_commit_publishes_last_write_per_object(
        writes in proptest::collection::vec((0usize..4, -3i32..3), 0..20),
    ) {
        let stm = Stm::new();
        let handles: Vec<_> = (0..4).map(|_| commit_new(&stm, 0i32)).collect();
        let before = stm.current_version();

        let mut expected = vec![0i32; 4];
        let mut txn = stm.start_update_transaction("prop");
        for (index, value) in &writes {
            txn.write(&handles[*index], *value).unwrap();
            expected[*index] = *value;
        }
        let version = txn.commit().unwrap();

        let changed = expected.iter().any(|v| *v != 0);
        prop_assert_eq!(version, if changed { before + 1 } else { before });
        prop_assert_eq!(stm.current_version(), version);
        for (index, (handle, value)) in handles.iter().zip(&expected).enumerate() {
            prop_assert_eq!(handle.atomic_get().unwrap(), *value);
            // untouched objects keep the version they were created at
            let created_at = index as u64 + 1;
            let expected_version = if *value != 0 { version } else { created_at };
            prop_assert_eq!(handle.latest_version(), Some(expected_version));
        }
    }
}
