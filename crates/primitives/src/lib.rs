//! Transactional building blocks for mvstm
//!
//! Each primitive wraps one or more [`Handle`]s and exposes operations
//! that run inside a caller-supplied [`Transaction`]:
//! - [`Counter`]: an `i64` counter
//! - [`TxRef`]: a single transactional value
//! - [`TxStack`]: a LIFO stack whose `pop` blocks while empty
//!
//! Primitives hold no state of their own beyond handles, so they are
//! cheap to clone and share between threads.
//!
//! [`Handle`]: mvstm_concurrency::Handle
//! [`Transaction`]: mvstm_concurrency::Transaction

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod counter;
pub mod stack;
pub mod tx_ref;

pub use counter::Counter;
pub use stack::TxStack;
pub use tx_ref::TxRef;
