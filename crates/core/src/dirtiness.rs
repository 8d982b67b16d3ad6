//! Commit classification of a tranlocal
//!
//! | Status | Meaning | At commit |
//! |--------|---------|-----------|
//! | `Fresh` | brand-new object, no committed ancestor | written |
//! | `Clean` | equal to the ancestor it was privatized from | skipped |
//! | `Dirty` | differs from its ancestor | written |
//! | `Conflict` | dirty, but the object moved past the ancestor | commit fails |
//! | `Committed` | shared immutable committed state | skipped |
//!
//! Dirtiness is decided by comparing field values, not by tracking
//! writes. A transaction that changes a value and then changes it back
//! is `Clean`.

use serde::{Deserialize, Serialize};

/// Classification of a tranlocal relative to its committed ancestor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirtinessStatus {
    /// Newly created, no committed ancestor
    Fresh,
    /// Unchanged since privatize
    Clean,
    /// Changed since privatize
    Dirty,
    /// Changed, but a newer version was committed meanwhile
    Conflict,
    /// Immutable committed state
    Committed,
}

impl DirtinessStatus {
    /// Whether a commit must write this tranlocal
    #[inline]
    pub fn needs_write(&self) -> bool {
        matches!(self, DirtinessStatus::Fresh | DirtinessStatus::Dirty)
    }

    /// Whether a tranlocal with this status may be attached as new
    #[inline]
    pub fn is_attachable(&self) -> bool {
        matches!(self, DirtinessStatus::Fresh | DirtinessStatus::Clean)
    }

    /// Name used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            DirtinessStatus::Fresh => "fresh",
            DirtinessStatus::Clean => "clean",
            DirtinessStatus::Dirty => "dirty",
            DirtinessStatus::Conflict => "conflict",
            DirtinessStatus::Committed => "committed",
        }
    }
}

impl std::fmt::Display for DirtinessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
