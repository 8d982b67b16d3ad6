//! Error taxonomy for the STM engine
//!
//! ## Categories
//!
//! | Category | Variants | Handling |
//! |----------|----------|----------|
//! | Dead transaction | `DeadTransaction` | caller bug, never retried |
//! | Conflict | `WriteConflict` | retry with a fresh transaction |
//! | Lock acquisition | `FailedToObtainLocks` | retry immediately |
//! | Load | `LoadUncommitted`, `LoadTooOldVersion`, `LoadLocked`, `NoCommittedDataFound` | snapshot unavailable |
//! | Retry signal | `Retry` | block until a read object changes |
//! | Misuse | `NoProgressPossible`, `Readonly` | caller bug |
//! | Application | `Application` | propagated after abort |
//!
//! Invariant violations are not errors; they panic (see [`crate::invariant`]).

use crate::types::{HandleId, TxnId, Version};
use thiserror::Error;

/// Result type for STM operations
pub type StmResult<T> = std::result::Result<T, StmError>;

/// Errors raised by transactions, handles and the commit protocol
#[derive(Debug, Error)]
pub enum StmError {
    /// Transaction used after it reached a terminal state
    #[error("{txn} is dead ({status})")]
    DeadTransaction {
        /// Transaction that was used
        txn: TxnId,
        /// Terminal status it was in
        status: &'static str,
    },

    /// Optimistic validation found an overlapping committed write
    #[error("write conflict on {handle}")]
    WriteConflict {
        /// Object whose committed version moved past the snapshot
        handle: HandleId,
    },

    /// Commit locks could not be obtained within the policy bounds
    #[error("failed to obtain commit locks for {txn}")]
    FailedToObtainLocks {
        /// Committing transaction
        txn: TxnId,
    },

    /// The object has never been committed
    #[error("{handle} has no committed state")]
    LoadUncommitted {
        /// Object that was loaded
        handle: HandleId,
    },

    /// No retained version is old enough for the snapshot
    #[error("{handle}: no version <= {requested} retained (oldest {oldest_retained})")]
    LoadTooOldVersion {
        /// Object that was loaded
        handle: HandleId,
        /// Read-version of the loading transaction
        requested: Version,
        /// Oldest version still held by the handle
        oldest_retained: Version,
    },

    /// Another transaction is publishing to the object
    #[error("{handle} is locked by {owner}")]
    LoadLocked {
        /// Object that was loaded
        handle: HandleId,
        /// Current lock owner
        owner: TxnId,
    },

    /// Non-transactional read of an object that was never committed
    #[error("no committed data found for {handle}")]
    NoCommittedDataFound {
        /// Object that was read
        handle: HandleId,
    },

    /// Write access requested from a read-only transaction
    #[error("{txn} is read-only")]
    Readonly {
        /// Offending transaction
        txn: TxnId,
    },

    /// Blocking retry requested with nothing to wait on
    #[error("{txn} cannot make progress: nothing was read")]
    NoProgressPossible {
        /// Offending transaction
        txn: TxnId,
    },

    /// Control-flow signal: block until a read object changes, then rerun
    #[error("retry requested")]
    Retry,

    /// A bounded blocking retry expired before any read object changed
    #[error("{txn} timed out waiting for a retry wake-up")]
    RetryTimeout {
        /// Transaction that was waiting
        txn: TxnId,
    },

    /// Error raised by the unit of work itself
    #[error("application error: {0}")]
    Application(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StmError {
    /// Wrap an application error so it can travel through `StmResult`
    pub fn application<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        StmError::Application(err.into())
    }

    /// Errors that a fresh transaction can be expected to get past
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StmError::WriteConflict { .. }
                | StmError::FailedToObtainLocks { .. }
                | StmError::LoadLocked { .. }
                | StmError::LoadTooOldVersion { .. }
        )
    }

    /// Check if this is the blocking-retry signal
    pub fn is_retry_signal(&self) -> bool {
        matches!(self, StmError::Retry)
    }

    /// Errors that indicate the caller used the engine incorrectly
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            StmError::DeadTransaction { .. }
                | StmError::NoProgressPossible { .. }
                | StmError::Readonly { .. }
        )
    }

    /// Check if this is a write conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, StmError::WriteConflict { .. })
    }
}
