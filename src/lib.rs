//! # mvstm
//!
//! Multi-version software transactional memory.
//!
//! Shared state lives in transactional objects addressed by
//! [`Handle`]s. Transactions read a consistent snapshot fixed at start,
//! buffer writes privately and publish them atomically at commit, failing
//! with a conflict if another commit got there first.
//!
//! ## Quick Start
//!
//! ```
//! use mvstm::prelude::*;
//!
//! let stm = Stm::new();
//!
//! let mut txn = stm.start_update_transaction("setup");
//! let from = txn.attach_new(Tranlocal::fresh(100i64)).unwrap();
//! let to = txn.attach_new(Tranlocal::fresh(0i64)).unwrap();
//! txn.commit().unwrap();
//!
//! stm.atomic()
//!     .family("transfer")
//!     .execute(|txn| {
//!         let balance = txn.read(&from)?;
//!         guard(balance >= 40)?;
//!         txn.write(&from, balance - 40)?;
//!         txn.modify(&to, |b| *b += 40)
//!     })
//!     .unwrap();
//!
//! assert_eq!(from.atomic_get().unwrap(), 60);
//! assert_eq!(to.atomic_get().unwrap(), 40);
//! ```
//!
//! ## Layers
//!
//! - [`Stm`] / [`StmBuilder`] - one clock, configuration and statistics
//! - [`Transaction`] - explicit begin / load / commit / abort / retry
//! - [`AtomicTemplate`] - retry-loop driver around a unit of work
//! - [`primitives`] - ready-made transactional structures

#![warn(missing_docs)]

mod error;
mod stm;
mod template;

pub mod prelude;

// Re-export main entry points
pub use error::{Error, Result};
pub use stm::{Stm, StmBuilder};
pub use template::{or_else, AtomicTemplate};

// Re-export the engine
pub use mvstm_concurrency::{
    guard, retry, CommitCandidate, CommitLockPolicy, GenericCommitLockPolicy, Handle, Latch,
    LockOutcome, Lockable, Tranlocal, TranlocalSnapshot, TranlocalState, Transaction,
    TransactionManager, TransactionStatus, TransactionalObject, WeakHandle,
};
pub use mvstm_core::{
    ConfigError, DirtinessStatus, HandleId, LockPolicyConfig, StatisticsSnapshot, StmConfig,
    StmError, StmResult, TxnId, Version, VersionClock,
};

/// Transactional building blocks
pub mod primitives {
    pub use mvstm_primitives::{Counter, TxRef, TxStack};
}
