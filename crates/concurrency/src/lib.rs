//! Multi-version concurrency layer for mvstm
//!
//! This crate implements the transactional engine:
//! - [`Tranlocal`]: one version of one object's field data
//! - [`Handle`]: object identity, retained committed versions, commit lock
//! - [`Latch`]: one-shot gate parking retrying transactions
//! - [`CommitLockPolicy`]: ordered, bounded lock acquisition at commit
//! - [`Transaction`]: snapshot reads, buffered writes, optimistic commit
//! - [`TransactionManager`]: clock, id allocator, policy and statistics
//!   shared by the transactions of one Stm
//!
//! ## Example
//!
//! ```
//! use mvstm_concurrency::{Tranlocal, Transaction, TransactionManager};
//! use std::sync::Arc;
//!
//! let manager = Arc::new(TransactionManager::default());
//!
//! let mut txn = Transaction::begin(Arc::clone(&manager), "setup", false);
//! let counter = txn.attach_new(Tranlocal::fresh(0i64)).unwrap();
//! txn.commit().unwrap();
//!
//! let mut txn = Transaction::begin(Arc::clone(&manager), "inc", false);
//! txn.modify(&counter, |n| *n += 1).unwrap();
//! assert_eq!(txn.commit().unwrap(), 2);
//! assert_eq!(counter.atomic_get().unwrap(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod handle;
pub mod latch;
pub mod manager;
pub mod object;
pub mod policy;
mod snapshot;
pub mod tranlocal;
pub mod transaction;

pub use handle::{Handle, Lockable, WeakHandle};
pub use latch::Latch;
pub use manager::TransactionManager;
pub use object::TransactionalObject;
pub use policy::{CommitCandidate, CommitLockPolicy, GenericCommitLockPolicy, LockOutcome};
pub use tranlocal::{Tranlocal, TranlocalSnapshot, TranlocalState};
pub use transaction::{guard, retry, Transaction, TransactionStatus};
