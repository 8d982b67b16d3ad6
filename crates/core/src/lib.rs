//! Core types for mvstm
//!
//! This crate defines the leaf building blocks shared by every layer of
//! the engine:
//! - [`VersionClock`]: the global commit clock
//! - [`TxnId`], [`HandleId`], [`Version`]: identifiers
//! - [`StmError`]: the error taxonomy
//! - [`DirtinessStatus`]: commit classification of a tranlocal
//! - [`StmStatistics`]: aggregate counters
//! - [`StmConfig`]: engine configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod dirtiness;
pub mod error;
pub mod invariant;
pub mod stats;
pub mod types;

pub use clock::VersionClock;
pub use config::{ConfigError, LockPolicyConfig, StmConfig};
pub use dirtiness::DirtinessStatus;
pub use error::{StmError, StmResult};
pub use stats::{StatisticsSnapshot, StmStatistics};
pub use types::{HandleId, TxnId, Version};
