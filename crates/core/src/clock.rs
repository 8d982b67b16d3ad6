//! Global version clock
//!
//! Every Stm owns exactly one clock. It defines the global serialization
//! order: a transaction fixes its read-version from [`VersionClock::current`]
//! and every non-empty commit advances the clock exactly once through
//! [`VersionClock::increment_and_get`].

use crate::types::Version;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically increasing commit counter shared by all transactions
#[derive(Debug)]
pub struct VersionClock {
    version: AtomicU64,
}

impl VersionClock {
    /// Create a clock starting at zero
    pub const fn new() -> Self {
        Self::with_initial(0)
    }

    /// Create a clock starting at `initial`
    pub const fn with_initial(initial: Version) -> Self {
        VersionClock {
            version: AtomicU64::new(initial),
        }
    }

    /// Current version (non-blocking)
    #[inline]
    pub fn current(&self) -> Version {
        self.version.load(Ordering::SeqCst)
    }

    /// Atomically advance the clock and return the new version
    ///
    /// Versions handed out are never reused, so two committed write-sets
    /// can always be ordered by their write-version.
    #[inline]
    pub fn increment_and_get(&self) -> Version {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for VersionClock {
    fn default() -> Self {
        Self::new()
    }
}
