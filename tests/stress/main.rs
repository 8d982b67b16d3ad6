//! Concurrency Stress Tests
//!
//! Many threads transferring between shared accounts while readers check
//! that every snapshot they observe is consistent.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --release --test stress
//! ```

#[path = "../common/mod.rs"]
mod common;

use common::*;
use mvstm::prelude::*;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const ACCOUNTS: usize = 16;
const INITIAL_BALANCE: i64 = 1_000;

fn open_accounts(stm: &Stm) -> Vec<Handle<i64>> {
    let mut txn = stm.start_update_transaction("open");
    let accounts = (0..ACCOUNTS)
        .map(|_| txn.attach_new(Tranlocal::fresh(INITIAL_BALANCE)).unwrap())
        .collect();
    txn.commit().unwrap();
    accounts
}

fn run_transfers(stm: Stm, accounts: Arc<Vec<Handle<i64>>>, writers: usize, transfers: usize) {
    let readers = 2;
    let barrier = Arc::new(Barrier::new(writers + readers));
    let done = Arc::new(AtomicBool::new(false));
    let snapshots = Arc::new(AtomicU64::new(0));

    let reader_threads: Vec<_> = (0..readers)
        .map(|_| {
            let stm = stm.clone();
            let accounts = Arc::clone(&accounts);
            let barrier = Arc::clone(&barrier);
            let done = Arc::clone(&done);
            let snapshots = Arc::clone(&snapshots);
            thread::spawn(move || {
                let template = stm.atomic().family("audit").readonly();
                barrier.wait();
                while !done.load(Ordering::Acquire) {
                    let total = template
                        .execute(|txn| {
                            let mut total = 0;
                            for account in accounts.iter() {
                                total += txn.read(account)?;
                            }
                            Ok(total)
                        })
                        .unwrap();
                    assert_eq!(total, INITIAL_BALANCE * ACCOUNTS as i64);
                    snapshots.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    let writer_threads: Vec<_> = (0..writers)
        .map(|_| {
            let stm = stm.clone();
            let accounts = Arc::clone(&accounts);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let template = stm.atomic().family("transfer");
                let mut rng = rand::thread_rng();
                barrier.wait();
                for _ in 0..transfers {
                    let from = rng.gen_range(0..ACCOUNTS);
                    let to = (from + rng.gen_range(1..ACCOUNTS)) % ACCOUNTS;
                    let amount = rng.gen_range(1..50);
                    template
                        .execute(|txn| {
                            txn.modify(&accounts[from], |b| *b -= amount)?;
                            txn.modify(&accounts[to], |b| *b += amount)
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for w in writer_threads {
        w.join().unwrap();
    }
    done.store(true, Ordering::Release);
    for r in reader_threads {
        r.join().unwrap();
    }
    assert!(snapshots.load(Ordering::Relaxed) > 0);
}

fn total(stm: &Stm, accounts: &[Handle<i64>]) -> i64 {
    accounts.iter().map(|a| read_committed(stm, a)).sum()
}

#[test]
fn test_transfers_preserve_total() {
    let stm = stm();
    let accounts = Arc::new(open_accounts(&stm));

    run_transfers(stm.clone(), Arc::clone(&accounts), 4, 500);

    assert_eq!(total(&stm, &accounts), INITIAL_BALANCE * ACCOUNTS as i64);
    let stats = stm.statistics();
    assert_eq!(stats.committed, 1 + 4 * 500);
    for account in accounts.iter() {
        assert_eq!(account.lock_owner(), None);
    }
}

#[test]
fn test_transfers_with_fail_fast_locks_and_short_history() {
    init_tracing();
    let stm = Stm::builder()
        .fail_fast()
        .history_depth(2)
        .load_lock_spins(0)
        .max_retries(100_000)
        .build()
        .unwrap();
    let accounts = Arc::new(open_accounts(&stm));

    run_transfers(stm.clone(), Arc::clone(&accounts), 8, 200);

    assert_eq!(total(&stm, &accounts), INITIAL_BALANCE * ACCOUNTS as i64);
    assert_eq!(stm.current_version(), 1 + 8 * 200);
}

#[test]
fn test_concurrent_creation_gets_distinct_objects() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 250;

    let stm = stm();
    let barrier = Arc::new(Barrier::new(THREADS));
    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let stm = stm.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..PER_THREAD)
                    .map(|i| commit_new(&stm, (t * PER_THREAD + i) as u64))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut handles = Vec::new();
    for w in workers {
        handles.extend(w.join().unwrap());
    }

    let mut ids: Vec<_> = handles.iter().map(|h| h.id()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), THREADS * PER_THREAD);
    assert_eq!(stm.current_version(), (THREADS * PER_THREAD) as u64);
    for (i, h) in handles.iter().enumerate() {
        assert_eq!(read_committed(&stm, h), i as u64);
    }
}
