//! Main entry point for mvstm
//!
//! An [`Stm`] owns one version clock and everything that must be shared
//! by the transactions running against it. Objects created under one Stm
//! must only be used by transactions of the same Stm.

use crate::error::Result;
use crate::template::AtomicTemplate;
use mvstm_concurrency::{CommitLockPolicy, Transaction, TransactionManager};
use mvstm_core::{LockPolicyConfig, StatisticsSnapshot, StmConfig, Version};
use std::sync::Arc;
use tracing::debug;

/// A software transactional memory instance
///
/// Cloning is cheap; clones share the clock and statistics.
///
/// # Example
///
/// ```
/// use mvstm::prelude::*;
///
/// let stm = Stm::new();
/// let mut txn = stm.start_update_transaction("setup");
/// let balance = txn.attach_new(Tranlocal::fresh(100i64)).unwrap();
/// txn.commit().unwrap();
///
/// let remaining = stm
///     .atomic()
///     .execute(|txn| txn.modify(&balance, |b| { *b -= 30; *b }))
///     .unwrap();
/// assert_eq!(remaining, 70);
/// ```
#[derive(Debug, Clone)]
pub struct Stm {
    manager: Arc<TransactionManager>,
}

impl Stm {
    /// Create an Stm with the default configuration
    pub fn new() -> Self {
        Stm {
            manager: Arc::new(TransactionManager::default()),
        }
    }

    /// Create a builder for Stm configuration
    pub fn builder() -> StmBuilder {
        StmBuilder::new()
    }

    /// Create an Stm from a complete configuration
    pub fn with_config(config: StmConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Start an update transaction reading at the current version
    pub fn start_update_transaction(&self, family: &str) -> Transaction {
        Transaction::begin(Arc::clone(&self.manager), family, false)
    }

    /// Start a read-only transaction reading at the current version
    pub fn start_readonly_transaction(&self, family: &str) -> Transaction {
        Transaction::begin(Arc::clone(&self.manager), family, true)
    }

    /// Current value of the version clock
    pub fn current_version(&self) -> Version {
        self.manager.current_version()
    }

    /// Point-in-time copy of the transaction counters
    pub fn statistics(&self) -> StatisticsSnapshot {
        self.manager.statistics().snapshot()
    }

    /// Active configuration
    pub fn config(&self) -> &StmConfig {
        self.manager.config()
    }

    /// Shared transaction manager
    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    /// Retry-loop driver bound to this Stm
    pub fn atomic(&self) -> AtomicTemplate {
        AtomicTemplate::new(self.clone())
    }
}

impl Default for Stm {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for Stm configuration
///
/// # Example
///
/// ```
/// use mvstm::Stm;
///
/// let stm = Stm::builder()
///     .history_depth(1)
///     .fail_fast()
///     .max_retries(50)
///     .build()
///     .unwrap();
/// assert_eq!(stm.config().history_depth, 1);
/// ```
#[derive(Debug, Default)]
pub struct StmBuilder {
    config: StmConfig,
    policy: Option<Box<dyn CommitLockPolicy>>,
}

impl StmBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every setting with `config`
    pub fn config(mut self, config: StmConfig) -> Self {
        self.config = config;
        self
    }

    /// Bounds of the default commit lock policy
    pub fn lock_policy(mut self, lock_policy: LockPolicyConfig) -> Self {
        self.config.lock_policy = lock_policy;
        self
    }

    /// Give up on the first contended commit lock
    pub fn fail_fast(self) -> Self {
        self.lock_policy(LockPolicyConfig::FAIL_FAST)
    }

    /// Use a custom commit lock policy instead of the configured one
    pub fn commit_lock_policy(mut self, policy: impl CommitLockPolicy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    /// Committed versions retained per object
    pub fn history_depth(mut self, depth: usize) -> Self {
        self.config.history_depth = depth;
        self
    }

    /// Spins a load waits out a concurrent publish
    pub fn load_lock_spins(mut self, spins: u32) -> Self {
        self.config.load_lock_spins = spins;
        self
    }

    /// Attempt bound of the retry-loop driver
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Whether templates start read-only and upgrade on first write
    pub fn speculative_readonly(mut self, enabled: bool) -> Self {
        self.config.speculative_readonly = enabled;
        self
    }

    /// Validate the configuration and create the Stm
    pub fn build(self) -> Result<Stm> {
        self.config.validate()?;
        debug!(config = ?self.config, custom_policy = self.policy.is_some(), "stm created");
        let manager = match self.policy {
            Some(policy) => TransactionManager::with_policy(self.config, policy),
            None => TransactionManager::new(self.config),
        };
        Ok(Stm {
            manager: Arc::new(manager),
        })
    }
}
