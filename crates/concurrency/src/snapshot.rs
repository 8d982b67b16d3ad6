//! Or-else snapshots of a transaction's attached map
//!
//! `start_or` pushes an [`AttachedSnapshot`]; the branch then either
//! keeps its changes (`end_or`) or rolls back to it
//! (`end_or_and_start_else`). Rolling back restores every entry that was
//! attached when the snapshot was taken and detaches every entry
//! attached since.

use mvstm_core::HandleId;
use rustc_hash::FxHashMap;
use std::any::Any;

/// Saved field values of every entry attached at one point in time
pub(crate) struct AttachedSnapshot {
    entries: FxHashMap<HandleId, Box<dyn Any + Send>>,
}

impl AttachedSnapshot {
    pub(crate) fn new(entries: FxHashMap<HandleId, Box<dyn Any + Send>>) -> Self {
        AttachedSnapshot { entries }
    }

    pub(crate) fn contains(&self, id: &HandleId) -> bool {
        self.entries.contains_key(id)
    }

    pub(crate) fn take(&mut self, id: &HandleId) -> Option<Box<dyn Any + Send>> {
        self.entries.remove(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl std::fmt::Debug for AttachedSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedSnapshot")
            .field("entries", &self.entries.len())
            .finish()
    }
}
