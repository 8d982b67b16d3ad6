//! Unified error type for mvstm
//!
//! [`Error`] wraps the engine's [`StmError`] and adds the failures that
//! only the outer layers produce: an exhausted retry budget and an
//! invalid configuration.

use mvstm_core::{ConfigError, StmError};
use thiserror::Error;

/// All mvstm errors
#[derive(Debug, Error)]
pub enum Error {
    /// Error raised by a transaction or by the unit of work
    #[error(transparent)]
    Stm(#[from] StmError),

    /// The retry-loop driver hit its attempt bound
    #[error("gave up after {attempts} attempts: {last}")]
    TooManyRetries {
        /// Attempts made
        attempts: u32,
        /// Error of the final attempt
        last: StmError,
    },

    /// The configuration was rejected
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for mvstm operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable
    ///
    /// Retryable errors may succeed with a fresh transaction.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Stm(e) if e.is_recoverable())
    }

    /// Check if this is a write conflict
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Stm(e) | Error::TooManyRetries { last: e, .. } => e.is_conflict(),
            Error::Config(_) => false,
        }
    }

    /// Check if the engine was used incorrectly
    pub fn is_misuse(&self) -> bool {
        matches!(self, Error::Stm(e) if e.is_misuse())
    }

    /// Check if the retry budget ran out
    pub fn is_too_many_retries(&self) -> bool {
        matches!(self, Error::TooManyRetries { .. })
    }

    /// Check if the unit of work itself failed
    pub fn is_application(&self) -> bool {
        matches!(self, Error::Stm(StmError::Application(_)))
    }

    /// Underlying engine error, if any
    pub fn as_stm(&self) -> Option<&StmError> {
        match self {
            Error::Stm(e) | Error::TooManyRetries { last: e, .. } => Some(e),
            Error::Config(_) => None,
        }
    }
}
