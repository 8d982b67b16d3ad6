//! Transactional LIFO stack
//!
//! Nodes are immutable transactional objects linked by handles; the
//! stack object holds the top handle and the length. Pushing creates a
//! node and rewrites the stack object, so concurrent pushes conflict on
//! the stack object only.
//!
//! [`TxStack::pop`] on an empty stack signals a blocking retry: under a
//! retry-loop driver the transaction sleeps until another transaction
//! pushes.
//!
//! Dropping the last clone of a stack releases its nodes one at a time,
//! so stacks of any depth can be dropped.

use mvstm_concurrency::{retry, Handle, Tranlocal, TranlocalState, Transaction};
use mvstm_core::StmResult;
use tracing::trace;

#[derive(Debug, Clone, PartialEq)]
struct StackNode<T> {
    value: T,
    next: Option<Handle<StackNode<T>>>,
}

#[derive(Debug, Clone, PartialEq)]
struct StackHead<T> {
    top: Option<Handle<StackNode<T>>>,
    len: usize,
}

/// A stack of `T` values
#[derive(Debug)]
pub struct TxStack<T> {
    head: Handle<StackHead<T>>,
}

impl<T: TranlocalState> TxStack<T> {
    /// Create an empty stack; it becomes visible when `txn` commits
    pub fn new(txn: &mut Transaction) -> StmResult<Self> {
        let head = txn.attach_new(Tranlocal::fresh(StackHead { top: None, len: 0 }))?;
        Ok(TxStack { head })
    }

    /// Push a value
    pub fn push(&self, txn: &mut Transaction, value: T) -> StmResult<()> {
        let top = txn.read(&self.head)?.top;
        let node = txn.attach_new(Tranlocal::fresh(StackNode { value, next: top }))?;
        txn.modify(&self.head, |head| {
            head.top = Some(node);
            head.len += 1;
        })
    }

    /// Pop the top value, retrying while the stack is empty
    pub fn pop(&self, txn: &mut Transaction) -> StmResult<T> {
        match self.try_pop(txn)? {
            Some(value) => Ok(value),
            None => {
                trace!(txn = %txn.id(), stack = %self.head.id(), "pop on empty stack, retrying");
                retry()
            }
        }
    }

    /// Pop the top value, `None` if the stack is empty
    pub fn try_pop(&self, txn: &mut Transaction) -> StmResult<Option<T>> {
        let top = match txn.read(&self.head)?.top {
            Some(top) => top,
            None => return Ok(None),
        };
        let node = txn.read(&top)?;
        txn.modify(&self.head, |head| {
            head.top = node.next;
            head.len -= 1;
        })?;
        Ok(Some(node.value))
    }

    /// Copy of the top value without removing it
    pub fn peek(&self, txn: &mut Transaction) -> StmResult<Option<T>> {
        match txn.read(&self.head)?.top {
            Some(top) => Ok(Some(txn.read(&top)?.value)),
            None => Ok(None),
        }
    }

    /// Number of values
    pub fn len(&self, txn: &mut Transaction) -> StmResult<usize> {
        txn.load(&self.head).map(|head| head.len)
    }

    /// Whether the stack holds no values
    pub fn is_empty(&self, txn: &mut Transaction) -> StmResult<bool> {
        self.len(txn).map(|len| len == 0)
    }

    /// Values from top to bottom
    pub fn to_vec(&self, txn: &mut Transaction) -> StmResult<Vec<T>> {
        let mut values = Vec::new();
        let mut cursor = txn.read(&self.head)?.top;
        while let Some(node) = cursor {
            let node = txn.read(&node)?;
            values.push(node.value);
            cursor = node.next;
        }
        Ok(values)
    }
}

impl<T> Drop for TxStack<T> {
    fn drop(&mut self) {
        let heads = match self.head.take_retained_values() {
            Some(heads) => heads,
            None => return,
        };
        for top in heads.into_iter().filter_map(|head| head.top) {
            top.release_chain(|node, pending| pending.extend(node.next));
        }
    }
}

impl<T> Clone for TxStack<T> {
    fn clone(&self) -> Self {
        TxStack {
            head: self.head.clone(),
        }
    }
}
