//! Aggregate transaction statistics
//!
//! The engine calls the `record_*` hooks; readers take a
//! [`StatisticsSnapshot`]. Counters use relaxed atomics, so a snapshot
//! taken while transactions run is not a consistent cut across counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by one Stm
#[derive(Debug, Default)]
pub struct StmStatistics {
    started_update: AtomicU64,
    started_readonly: AtomicU64,
    committed: AtomicU64,
    empty_commits: AtomicU64,
    readonly_commits: AtomicU64,
    aborted: AtomicU64,
    retried: AtomicU64,
    write_conflicts: AtomicU64,
    lock_failures: AtomicU64,
    load_failures: AtomicU64,
    writes: AtomicU64,
}

impl StmStatistics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// A transaction was started
    pub fn record_start(&self, readonly: bool) {
        if readonly {
            self.started_readonly.fetch_add(1, Ordering::Relaxed);
        } else {
            self.started_update.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// A non-empty commit published `writes` objects
    pub fn record_commit(&self, writes: usize) {
        self.committed.fetch_add(1, Ordering::Relaxed);
        self.writes.fetch_add(writes as u64, Ordering::Relaxed);
    }

    /// An update transaction committed without dirty writes
    pub fn record_empty_commit(&self) {
        self.empty_commits.fetch_add(1, Ordering::Relaxed);
    }

    /// A read-only transaction committed
    pub fn record_readonly_commit(&self) {
        self.readonly_commits.fetch_add(1, Ordering::Relaxed);
    }

    /// A transaction aborted
    pub fn record_abort(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// A transaction blocked in `abort_and_retry`
    pub fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    /// A commit failed validation
    pub fn record_write_conflict(&self) {
        self.write_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// A commit could not obtain its locks
    pub fn record_lock_failure(&self) {
        self.lock_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A load failed because the snapshot was unavailable
    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            started_update: self.started_update.load(Ordering::Relaxed),
            started_readonly: self.started_readonly.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            empty_commits: self.empty_commits.load(Ordering::Relaxed),
            readonly_commits: self.readonly_commits.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            write_conflicts: self.write_conflicts.load(Ordering::Relaxed),
            lock_failures: self.lock_failures.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`StmStatistics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    /// Update transactions started
    pub started_update: u64,
    /// Read-only transactions started
    pub started_readonly: u64,
    /// Commits that published at least one object
    pub committed: u64,
    /// Update commits with an empty write-set
    pub empty_commits: u64,
    /// Read-only commits
    pub readonly_commits: u64,
    /// Aborts, explicit or caused by a failed commit
    pub aborted: u64,
    /// Blocking retries
    pub retried: u64,
    /// Commits rejected by validation
    pub write_conflicts: u64,
    /// Commits that could not obtain their locks
    pub lock_failures: u64,
    /// Loads that failed (locked, too old, uncommitted)
    pub load_failures: u64,
    /// Objects published by commits
    pub writes: u64,
}

impl StatisticsSnapshot {
    /// Total transactions started
    pub fn started(&self) -> u64 {
        self.started_update + self.started_readonly
    }

    /// Fraction of finished transactions that committed (0.0 - 1.0)
    pub fn commit_rate(&self) -> f64 {
        let commits = self.committed + self.empty_commits + self.readonly_commits;
        let finished = commits + self.aborted;
        if finished == 0 {
            0.0
        } else {
            commits as f64 / finished as f64
        }
    }
}
