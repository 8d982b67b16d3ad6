//! Commit lock acquisition
//!
//! Before publishing, a committing transaction must own the lock of every
//! object in its write-set and confirm that none of them moved past the
//! version it privatized from. A [`CommitLockPolicy`] does both.
//!
//! ## Deadlock freedom
//!
//! [`GenericCommitLockPolicy`] locks in ascending [`HandleId`] order and
//! never blocks on a lock: a contended lock is spun on a bounded number of
//! times, then every lock taken so far is released and the whole
//! write-set is retried after a short backoff. Two committers can
//! therefore never wait on each other.
//!
//! | Config | Spins per lock | Write-set retries |
//! |--------|----------------|-------------------|
//! | `FAIL_FAST` | 0 | 0 |
//! | `FAIL_FAST_BUT_RETRY` | 10 | 10 |

use crate::handle::Lockable;
use mvstm_core::{HandleId, LockPolicyConfig, TxnId, Version};
use smallvec::SmallVec;
use std::time::Duration;
use tracing::trace;

/// Result of a lock-all attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// Every lock is held by the caller
    Success,
    /// Contention exhausted the policy; no locks are held
    Failure,
    /// An object moved past the version it was read at; no locks are held
    Conflict(HandleId),
}

/// One write-set member as seen by a lock policy
pub trait CommitCandidate {
    /// The object's lock
    fn lockable(&self) -> &dyn Lockable;

    /// Version the private copy was read from, `None` for a new object
    fn ancestor_version(&self) -> Option<Version>;
}

/// Strategy for locking a write-set at commit
pub trait CommitLockPolicy: Send + Sync + std::fmt::Debug {
    /// Lock every candidate for `owner` and validate its version
    ///
    /// On anything but [`LockOutcome::Success`] no lock taken by this call
    /// is left held. On success the caller owns every lock and must
    /// release them.
    fn try_lock_all_and_detect_conflicts(
        &self,
        write_set: &[&dyn CommitCandidate],
        owner: TxnId,
    ) -> LockOutcome;
}

/// Ordered, bounded-spin lock policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericCommitLockPolicy {
    spin_attempts_per_lock: u32,
    retry_count: u32,
}

impl GenericCommitLockPolicy {
    /// Give up on the first contended lock
    pub const FAIL_FAST: GenericCommitLockPolicy = GenericCommitLockPolicy {
        spin_attempts_per_lock: LockPolicyConfig::FAIL_FAST.spin_attempts_per_lock,
        retry_count: LockPolicyConfig::FAIL_FAST.retry_count,
    };

    /// Spin briefly, then retry the write-set a bounded number of times
    pub const FAIL_FAST_BUT_RETRY: GenericCommitLockPolicy = GenericCommitLockPolicy {
        spin_attempts_per_lock: LockPolicyConfig::FAIL_FAST_BUT_RETRY.spin_attempts_per_lock,
        retry_count: LockPolicyConfig::FAIL_FAST_BUT_RETRY.retry_count,
    };

    /// Policy with explicit bounds
    pub const fn new(spin_attempts_per_lock: u32, retry_count: u32) -> Self {
        GenericCommitLockPolicy {
            spin_attempts_per_lock,
            retry_count,
        }
    }

    /// Policy described by a config section
    pub fn from_config(config: &LockPolicyConfig) -> Self {
        Self::new(config.spin_attempts_per_lock, config.retry_count)
    }

    /// Spins on a contended lock per attempt
    pub fn spin_attempts_per_lock(&self) -> u32 {
        self.spin_attempts_per_lock
    }

    /// Write-set retries after the first attempt
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn lock_with_spins(&self, lockable: &dyn Lockable, owner: TxnId) -> bool {
        if lockable.try_lock(owner) {
            return true;
        }
        for _ in 0..self.spin_attempts_per_lock {
            std::hint::spin_loop();
            if lockable.try_lock(owner) {
                return true;
            }
        }
        false
    }
}

impl Default for GenericCommitLockPolicy {
    fn default() -> Self {
        Self::FAIL_FAST_BUT_RETRY
    }
}

fn release_all(held: &[&dyn CommitCandidate], owner: TxnId) {
    for candidate in held {
        candidate.lockable().release_lock(owner);
    }
}

// Yield for the first few rounds, then sleep with exponential growth.
fn backoff(attempt: u32) {
    if attempt < 3 {
        std::thread::yield_now();
    } else {
        let micros = 10u64 << attempt.min(6);
        std::thread::sleep(Duration::from_micros(micros));
    }
}

impl CommitLockPolicy for GenericCommitLockPolicy {
    fn try_lock_all_and_detect_conflicts(
        &self,
        write_set: &[&dyn CommitCandidate],
        owner: TxnId,
    ) -> LockOutcome {
        let mut ordered: SmallVec<[&dyn CommitCandidate; 16]> =
            write_set.iter().copied().collect();
        ordered.sort_unstable_by_key(|c| c.lockable().handle_id());

        'attempts: for attempt in 0..=self.retry_count {
            for (index, candidate) in ordered.iter().enumerate() {
                let lockable = candidate.lockable();
                if !self.lock_with_spins(lockable, owner) {
                    trace!(
                        txn = %owner,
                        handle = %lockable.handle_id(),
                        attempt,
                        "commit lock contended"
                    );
                    release_all(&ordered[..index], owner);
                    if attempt < self.retry_count {
                        backoff(attempt);
                    }
                    continue 'attempts;
                }

                if lockable.latest_version() != candidate.ancestor_version() {
                    release_all(&ordered[..=index], owner);
                    return LockOutcome::Conflict(lockable.handle_id());
                }
            }
            return LockOutcome::Success;
        }

        LockOutcome::Failure
    }
}
