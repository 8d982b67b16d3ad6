//! Retry-loop driver
//!
//! [`AtomicTemplate::execute`] runs a unit of work in a transaction and
//! commits it, starting over whenever the attempt failed for a reason a
//! fresh transaction can get past.
//!
//! | Outcome of an attempt | Action |
//! |-----------------------|--------|
//! | committed | return the value |
//! | `WriteConflict`, `FailedToObtainLocks`, `LoadLocked`, `LoadTooOldVersion` | new transaction, counted against `max_retries` |
//! | `Retry` signal | block until a read object changes, then rerun; `Readonly` for a `readonly()` template |
//! | `Readonly` in a speculative read-only attempt | rerun as an update transaction |
//! | anything else | abort and propagate |
//!
//! The unit of work may run many times but at most one attempt commits,
//! so it must not have side effects outside the transaction.
//!
//! ## Speculative read-only
//!
//! With `speculative_readonly` enabled a template starts read-only, which
//! skips privatizing. The first time the work asks for write access the
//! template upgrades, and every later execution of the same template
//! (and its clones) starts as an update transaction.

use crate::error::{Error, Result};
use crate::stm::Stm;
use mvstm_concurrency::{Transaction, TransactionStatus};
use mvstm_core::{StmError, StmResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Reusable retry-loop driver bound to one Stm
#[derive(Debug, Clone)]
pub struct AtomicTemplate {
    stm: Stm,
    family: Arc<str>,
    readonly: bool,
    speculative: bool,
    max_retries: u32,
    upgraded: Arc<AtomicBool>,
}

impl AtomicTemplate {
    /// Template using the Stm's configured retry bound and speculation
    pub fn new(stm: Stm) -> Self {
        let config = stm.config();
        let speculative = config.speculative_readonly;
        let max_retries = config.max_retries;
        AtomicTemplate {
            stm,
            family: Arc::from("atomic"),
            readonly: false,
            speculative,
            max_retries,
            upgraded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Family name given to the transactions
    pub fn family(mut self, family: &str) -> Self {
        self.family = Arc::from(family);
        self
    }

    /// Run every attempt read-only; write access fails with `Readonly`
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Enable or disable speculative read-only starts
    pub fn speculative_readonly(mut self, enabled: bool) -> Self {
        self.speculative = enabled;
        self
    }

    /// Attempt bound for recoverable failures
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Whether a speculative start was upgraded to an update transaction
    pub fn is_upgraded(&self) -> bool {
        self.upgraded.load(Ordering::Acquire)
    }

    fn starts_readonly(&self) -> bool {
        self.readonly || (self.speculative && !self.is_upgraded())
    }

    fn begin(&self, readonly: bool) -> Transaction {
        Transaction::begin(Arc::clone(self.stm.manager()), Arc::clone(&self.family), readonly)
    }

    fn upgrade(&self, txn: &mut Transaction) -> Transaction {
        let _ = txn.abort();
        self.upgraded.store(true, Ordering::Release);
        debug!(txn = %txn.id(), family = %self.family, "upgrading read-only transaction");
        self.begin(false)
    }

    /// Run `work` until one attempt commits
    ///
    /// # Errors
    ///
    /// - [`Error::TooManyRetries`] when recoverable failures exhaust the
    ///   attempt bound
    /// - [`Error::Stm`] for anything the work returns that is not a retry
    ///   signal or a recoverable failure
    pub fn execute<T, F>(&self, mut work: F) -> Result<T>
    where
        F: FnMut(&mut Transaction) -> StmResult<T>,
    {
        let mut txn = self.begin(self.starts_readonly());
        let mut attempts = 0u32;

        loop {
            let result = work(&mut txn).and_then(|value| txn.commit().map(|_| value));
            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if err.is_retry_signal() {
                if txn.is_readonly() {
                    if self.readonly {
                        let id = txn.id();
                        let _ = txn.abort();
                        debug!(txn = %id, family = %self.family, "read-only template cannot block");
                        return Err(StmError::Readonly { txn: id }.into());
                    }
                    txn = self.upgrade(&mut txn);
                    continue;
                }
                if let Err(e) = txn.abort_and_retry() {
                    let _ = txn.abort();
                    return Err(e.into());
                }
                continue;
            }

            if matches!(err, StmError::Readonly { .. }) && txn.is_readonly() && !self.readonly {
                txn = self.upgrade(&mut txn);
                continue;
            }

            if err.is_recoverable() {
                attempts += 1;
                if attempts >= self.max_retries {
                    warn!(
                        txn = %txn.id(),
                        family = %self.family,
                        attempts,
                        error = %err,
                        "retry budget exhausted"
                    );
                    let _ = txn.abort();
                    return Err(Error::TooManyRetries {
                        attempts,
                        last: err,
                    });
                }
                trace!(txn = %txn.id(), family = %self.family, attempts, error = %err, "retrying");
                let readonly = txn.is_readonly();
                let _ = txn.abort();
                txn = self.begin(readonly);
                continue;
            }

            if txn.status() == TransactionStatus::Active {
                let _ = txn.abort();
            }
            return Err(err.into());
        }
    }
}

/// Run `first`; if it signals retry, roll its changes back and run `second`
///
/// Changes made by `first` before a retry signal are discarded. Other
/// errors from `first` are returned as they are.
pub fn or_else<T, A, B>(txn: &mut Transaction, first: A, second: B) -> StmResult<T>
where
    A: FnOnce(&mut Transaction) -> StmResult<T>,
    B: FnOnce(&mut Transaction) -> StmResult<T>,
{
    txn.start_or()?;
    match first(txn) {
        Ok(value) => {
            txn.end_or()?;
            Ok(value)
        }
        Err(err) if err.is_retry_signal() => {
            txn.end_or_and_start_else()?;
            second(txn)
        }
        Err(err) => {
            if txn.status() == TransactionStatus::Active {
                txn.end_or()?;
            }
            Err(err)
        }
    }
}
