//! Identifier types
//!
//! - [`Version`]: a VersionClock value (read-version or write-version)
//! - [`TxnId`]: identity of a transaction, used as the lock owner
//! - [`HandleId`]: identity of a transactional object, used for lock ordering

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A VersionClock value
pub type Version = u64;

/// Unique identifier for a transaction
///
/// Transaction ids start at 1; zero is reserved to mean "no owner" in the
/// lock word of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxnId(u64);

impl TxnId {
    /// Wrap a raw id
    ///
    /// # Panics
    ///
    /// Panics if `raw` is zero.
    pub fn new(raw: u64) -> Self {
        assert!(raw != 0, "transaction id 0 is reserved");
        TxnId(raw)
    }

    /// Decode a lock word, where zero means unlocked
    #[inline]
    pub fn from_lock_word(word: u64) -> Option<Self> {
        if word == 0 {
            None
        } else {
            Some(TxnId(word))
        }
    }

    /// Raw value
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TxnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Identity of one transactional object
///
/// Generated once when the object's handle is created and never reused
/// within a process. Commit lock policies acquire locks in ascending
/// `HandleId` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(u64);

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

impl HandleId {
    /// Allocate a fresh, process-unique id
    pub fn next() -> Self {
        HandleId(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}
