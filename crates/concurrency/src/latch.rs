//! One-shot gate used to park retrying transactions
//!
//! A transaction that retries registers the same latch with every object
//! it read, then waits on it. The first qualifying commit opens it; a
//! latch never closes again.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct LatchState {
    open: Mutex<bool>,
    cond: Condvar,
}

/// Cheaply clonable one-shot latch
#[derive(Debug, Clone, Default)]
pub struct Latch {
    state: Arc<LatchState>,
}

impl Latch {
    /// Create a closed latch
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the latch and wake every waiter; opening twice is harmless
    pub fn open(&self) {
        let mut open = self.state.open.lock();
        if !*open {
            *open = true;
            self.state.cond.notify_all();
        }
    }

    /// Whether the latch was opened
    pub fn is_open(&self) -> bool {
        *self.state.open.lock()
    }

    /// Block until the latch is opened
    pub fn await_open(&self) {
        let mut open = self.state.open.lock();
        while !*open {
            self.state.cond.wait(&mut open);
        }
    }

    /// Block until the latch is opened or `timeout` elapses
    ///
    /// Returns whether the latch is open.
    pub fn await_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut open = self.state.open.lock();
        while !*open {
            if self.state.cond.wait_until(&mut open, deadline).timed_out() {
                return *open;
            }
        }
        true
    }
}
