//! Single transactional value

use mvstm_concurrency::{Handle, Tranlocal, TranlocalState, Transaction};
use mvstm_core::StmResult;

/// A mutable cell whose reads and writes go through a transaction
#[derive(Debug)]
pub struct TxRef<T> {
    handle: Handle<T>,
}

impl<T: TranlocalState> TxRef<T> {
    /// Create a cell; it becomes visible when `txn` commits
    pub fn new(txn: &mut Transaction, value: T) -> StmResult<Self> {
        let handle = txn.attach_new(Tranlocal::fresh(value))?;
        Ok(TxRef { handle })
    }

    /// Wrap an existing handle
    pub fn from_handle(handle: Handle<T>) -> Self {
        TxRef { handle }
    }

    /// Underlying handle
    pub fn handle(&self) -> &Handle<T> {
        &self.handle
    }

    /// Copy of the current value
    pub fn get(&self, txn: &mut Transaction) -> StmResult<T> {
        txn.read(&self.handle)
    }

    /// Apply `f` to the current value without copying it
    pub fn with<R>(&self, txn: &mut Transaction, f: impl FnOnce(&T) -> R) -> StmResult<R> {
        txn.load(&self.handle).map(|t| f(t.value()))
    }

    /// Replace the value
    pub fn set(&self, txn: &mut Transaction, value: T) -> StmResult<()> {
        txn.write(&self.handle, value)
    }

    /// Replace the value, returning the old one
    pub fn replace(&self, txn: &mut Transaction, value: T) -> StmResult<T> {
        txn.modify(&self.handle, |current| std::mem::replace(current, value))
    }

    /// Update the value in place
    pub fn modify<R>(&self, txn: &mut Transaction, f: impl FnOnce(&mut T) -> R) -> StmResult<R> {
        txn.modify(&self.handle, f)
    }

    /// Newest committed value, read outside any transaction
    pub fn atomic_get(&self) -> StmResult<T> {
        self.handle.atomic_get()
    }
}

impl<T> Clone for TxRef<T> {
    fn clone(&self) -> Self {
        TxRef {
            handle: self.handle.clone(),
        }
    }
}
