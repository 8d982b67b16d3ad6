//! Shared state behind every transaction of one Stm
//!
//! The [`TransactionManager`] owns what transactions of the same Stm
//! must agree on:
//! - the global [`VersionClock`]
//! - the transaction id allocator
//! - the commit lock policy
//! - the statistics sink and the configuration
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. collect the write-set (Fresh / Dirty entries); Conflict aborts
//! 2. empty write-set: return the read-version, clock untouched
//! 3. lock + validate the write-set through the policy
//! 4. increment_and_get() the clock: the write-version
//! 5. store_and_release_lock() every entry at the write-version
//! 6. return the write-version
//! ```
//!
//! The clock is advanced once per non-empty commit, after every lock is
//! held and validated and before anything is published. Version numbers
//! are contiguous: a version is only allocated once the commit can no
//! longer fail.

use crate::policy::{CommitLockPolicy, GenericCommitLockPolicy};
use mvstm_core::{StmConfig, StmStatistics, TxnId, Version, VersionClock};
use std::sync::atomic::{AtomicU64, Ordering};

/// Clock, id allocator, policy, statistics and config of one Stm
#[derive(Debug)]
pub struct TransactionManager {
    /// Global version clock
    clock: VersionClock,

    /// Next transaction id; starts at 1 because 0 marks an unlocked handle
    next_txn_id: AtomicU64,

    policy: Box<dyn CommitLockPolicy>,
    statistics: StmStatistics,
    config: StmConfig,
}

impl TransactionManager {
    /// Create a manager using the lock policy described by `config`
    pub fn new(config: StmConfig) -> Self {
        let policy = GenericCommitLockPolicy::from_config(&config.lock_policy);
        Self::with_policy(config, Box::new(policy))
    }

    /// Create a manager with a custom commit lock policy
    pub fn with_policy(config: StmConfig, policy: Box<dyn CommitLockPolicy>) -> Self {
        TransactionManager {
            clock: VersionClock::new(),
            next_txn_id: AtomicU64::new(1),
            policy,
            statistics: StmStatistics::new(),
            config,
        }
    }

    /// Global version clock
    #[inline]
    pub fn clock(&self) -> &VersionClock {
        &self.clock
    }

    /// Get current global version
    #[inline]
    pub fn current_version(&self) -> Version {
        self.clock.current()
    }

    /// Allocate next transaction ID
    pub fn next_txn_id(&self) -> TxnId {
        TxnId::new(self.next_txn_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Commit lock policy
    pub fn policy(&self) -> &dyn CommitLockPolicy {
        self.policy.as_ref()
    }

    /// Statistics sink
    pub fn statistics(&self) -> &StmStatistics {
        &self.statistics
    }

    /// Configuration
    pub fn config(&self) -> &StmConfig {
        &self.config
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new(StmConfig::default())
    }
}
