//! Retry-loop driver and primitives

use crate::common::*;
use mvstm::prelude::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_counter_example() {
    let stm = stm();
    let start = stm.current_version();

    let mut txn = stm.start_update_transaction("create");
    let counter = Counter::new(&mut txn, 0).unwrap();
    assert_eq!(txn.commit().unwrap(), start + 1);

    let mut txn = stm.start_update_transaction("inc");
    counter.inc(&mut txn).unwrap();
    assert_eq!(txn.commit().unwrap(), start + 2);

    let mut txn = stm.start_readonly_transaction("get");
    assert_eq!(counter.get(&mut txn).unwrap(), 1);
    assert_eq!(stm.current_version(), start + 2);
}

#[test]
fn test_template_absorbs_conflicts() {
    const THREADS: usize = 8;
    const INCREMENTS: usize = 200;

    let stm = stm();
    let counter = {
        let mut txn = stm.start_update_transaction("create");
        let counter = Counter::new(&mut txn, 0).unwrap();
        txn.commit().unwrap();
        counter
    };
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let stm = stm.clone();
            let counter = counter.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let template = stm.atomic().family("inc");
                barrier.wait();
                for _ in 0..INCREMENTS {
                    template.execute(|txn| counter.inc(txn)).unwrap();
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    let expected = (THREADS * INCREMENTS) as i64;
    assert_eq!(counter.atomic_get().unwrap(), expected);
    let stats = stm.statistics();
    assert_eq!(stats.committed, 1 + expected as u64);
    assert_eq!(stm.current_version(), 1 + expected as u64);
}

#[test]
fn test_speculative_readonly_pure_reads_stay_readonly() {
    let stm = stm();
    let a = commit_new(&stm, 3i32);
    let template = stm.atomic();

    let doubled = template.execute(|txn| txn.read(&a).map(|v| v * 2)).unwrap();
    assert_eq!(doubled, 6);
    assert!(!template.is_upgraded());
    assert_eq!(stm.statistics().readonly_commits, 1);
}

#[test]
fn test_or_else_picks_first_available_stack() {
    let stm = stm();
    let (left, right) = {
        let mut txn = stm.start_update_transaction("stacks");
        let left: TxStack<i32> = TxStack::new(&mut txn).unwrap();
        let right: TxStack<i32> = TxStack::new(&mut txn).unwrap();
        right.push(&mut txn, 2).unwrap();
        txn.commit().unwrap();
        (left, right)
    };

    let popped = stm
        .atomic()
        .execute(|txn| or_else(txn, |txn| left.pop(txn), |txn| right.pop(txn)))
        .unwrap();
    assert_eq!(popped, 2);

    let mut txn = stm.start_readonly_transaction("check");
    assert!(left.is_empty(&mut txn).unwrap());
    assert!(right.is_empty(&mut txn).unwrap());
}

#[test]
fn test_or_else_rolls_back_first_branch_writes() {
    let stm = stm();
    let log = commit_new(&stm, Vec::<&'static str>::new());
    let stack = {
        let mut txn = stm.start_update_transaction("stack");
        let stack: TxStack<i32> = TxStack::new(&mut txn).unwrap();
        txn.commit().unwrap();
        stack
    };

    let taken = stm
        .atomic()
        .speculative_readonly(false)
        .execute(|txn| {
            or_else(
                txn,
                |txn| {
                    txn.modify(&log, |l| l.push("tried stack"))?;
                    stack.pop(txn).map(Some)
                },
                |_txn| Ok(None),
            )
        })
        .unwrap();

    assert_eq!(taken, None);
    assert!(read_committed(&stm, &log).is_empty());
}

#[test]
fn test_tx_ref_transfer_keeps_total() {
    let stm = stm();
    let (from, to) = {
        let mut txn = stm.start_update_transaction("open");
        let from = TxRef::new(&mut txn, 100i64).unwrap();
        let to = TxRef::new(&mut txn, 0i64).unwrap();
        txn.commit().unwrap();
        (from, to)
    };

    let result = stm.atomic().execute(|txn| {
        let balance = from.get(txn)?;
        if balance < 500 {
            return Err(StmError::application("insufficient funds"));
        }
        from.set(txn, balance - 500)?;
        to.modify(txn, |b| *b += 500)
    });
    assert!(result.unwrap_err().is_application());

    stm.atomic()
        .execute(|txn| {
            from.modify(txn, |b| *b -= 30)?;
            to.modify(txn, |b| *b += 30)
        })
        .unwrap();
    assert_eq!(from.atomic_get().unwrap() + to.atomic_get().unwrap(), 100);
    assert_eq!(to.atomic_get().unwrap(), 30);
}
