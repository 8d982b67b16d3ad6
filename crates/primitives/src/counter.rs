//! Transactional counter
//!
//! ```
//! use mvstm_concurrency::{Transaction, TransactionManager};
//! use mvstm_primitives::Counter;
//! use std::sync::Arc;
//!
//! let manager = Arc::new(TransactionManager::default());
//! let mut txn = Transaction::begin(Arc::clone(&manager), "counter", false);
//! let counter = Counter::new(&mut txn, 0).unwrap();
//! counter.inc(&mut txn).unwrap();
//! txn.commit().unwrap();
//!
//! assert_eq!(counter.atomic_get().unwrap(), 1);
//! ```

use mvstm_concurrency::{Handle, Tranlocal, Transaction};
use mvstm_core::StmResult;

/// An `i64` counter stored in one transactional object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter {
    handle: Handle<i64>,
}

impl Counter {
    /// Create a counter; it becomes visible when `txn` commits
    pub fn new(txn: &mut Transaction, initial: i64) -> StmResult<Self> {
        let handle = txn.attach_new(Tranlocal::fresh(initial))?;
        Ok(Counter { handle })
    }

    /// Wrap an existing handle
    pub fn from_handle(handle: Handle<i64>) -> Self {
        Counter { handle }
    }

    /// Underlying handle
    pub fn handle(&self) -> &Handle<i64> {
        &self.handle
    }

    /// Current value
    pub fn get(&self, txn: &mut Transaction) -> StmResult<i64> {
        txn.read(&self.handle)
    }

    /// Replace the value
    pub fn set(&self, txn: &mut Transaction, value: i64) -> StmResult<()> {
        txn.write(&self.handle, value)
    }

    /// Add one; returns the new value
    pub fn inc(&self, txn: &mut Transaction) -> StmResult<i64> {
        self.add(txn, 1)
    }

    /// Subtract one; returns the new value
    pub fn dec(&self, txn: &mut Transaction) -> StmResult<i64> {
        self.add(txn, -1)
    }

    /// Add `delta` (wrapping); returns the new value
    pub fn add(&self, txn: &mut Transaction, delta: i64) -> StmResult<i64> {
        txn.modify(&self.handle, |n| {
            *n = n.wrapping_add(delta);
            *n
        })
    }

    /// Newest committed value, read outside any transaction
    pub fn atomic_get(&self) -> StmResult<i64> {
        self.handle.atomic_get()
    }
}
