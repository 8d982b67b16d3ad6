//! Convenient imports for mvstm
//!
//! ```
//! use mvstm::prelude::*;
//!
//! let stm = Stm::new();
//! let mut txn = stm.start_update_transaction("counter");
//! let counter = Counter::new(&mut txn, 0).unwrap();
//! txn.commit().unwrap();
//! # let _ = counter;
//! ```

// Main entry point
pub use crate::stm::{Stm, StmBuilder};
pub use crate::template::{or_else, AtomicTemplate};

// Error handling
pub use crate::error::{Error, Result};
pub use mvstm_core::{StmError, StmResult};

// Engine types
pub use mvstm_concurrency::{
    guard, retry, Handle, Tranlocal, Transaction, TransactionStatus, TransactionalObject,
    WeakHandle,
};
pub use mvstm_core::{StmConfig, Version};

// Primitives
pub use mvstm_primitives::{Counter, TxRef, TxStack};
