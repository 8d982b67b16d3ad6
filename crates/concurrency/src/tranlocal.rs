//! Transaction-local versioned object state
//!
//! A [`Tranlocal`] holds one version's worth of field data for one
//! transactional object. There are two kinds:
//!
//! - **committed**: published by a commit, stored in the object's handle
//!   behind an `Arc`, immutable forever
//! - **private**: a copy owned by one update transaction, either fresh
//!   (a brand-new object) or privatized from a committed ancestor
//!
//! ## Version field
//!
//! | Kind | `version()` |
//! |------|-------------|
//! | private | read-version of the owning transaction |
//! | committed | write-version assigned at commit |
//!
//! ## Dirtiness
//!
//! A private copy is `Dirty` when its value differs from the ancestor's
//! value. Changing a field and changing it back leaves the copy `Clean`,
//! so such a transaction writes nothing. Detecting `Conflict` needs the
//! handle's current version and is done by the transaction.

use crate::handle::Handle;
use mvstm_core::{check_invariant, DirtinessStatus, HandleId, Version};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Field state that can live inside a transactional object
///
/// Values are compared to decide dirtiness and cloned to privatize.
/// References to other transactional objects must be [`Handle`]s, never
/// tranlocals.
pub trait TranlocalState: Clone + PartialEq + Send + Sync + 'static {}

impl<T> TranlocalState for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// One version of one object's field data
#[derive(Debug)]
pub struct Tranlocal<S> {
    owner: HandleId,
    version: Version,
    committed: bool,
    /// Committed version this copy was privatized from
    ancestor: Option<Arc<Tranlocal<S>>>,
    /// Handle a privatized copy came from; cleared at commit so
    /// committed state never keeps its own handle alive
    origin: Option<Handle<S>>,
    value: S,
}

/// Saved field values of a private tranlocal
#[derive(Debug, Clone)]
pub struct TranlocalSnapshot<S> {
    value: S,
}

impl<S: TranlocalState> Tranlocal<S> {
    /// Create state for a brand-new object
    ///
    /// The object's identity is allocated here; attaching the tranlocal to
    /// a transaction creates the handle carrying that identity.
    pub fn fresh(value: S) -> Self {
        Tranlocal {
            owner: HandleId::next(),
            version: 0,
            committed: false,
            ancestor: None,
            origin: None,
            value,
        }
    }

    /// Private, mutable copy of a committed tranlocal
    pub(crate) fn privatize(
        handle: &Handle<S>,
        ancestor: &Arc<Tranlocal<S>>,
        read_version: Version,
    ) -> Self {
        check_invariant!(
            ancestor.committed,
            "privatizing uncommitted state of {}",
            ancestor.owner
        );
        Tranlocal {
            owner: ancestor.owner,
            version: read_version,
            committed: false,
            ancestor: Some(Arc::clone(ancestor)),
            origin: Some(handle.clone()),
            value: ancestor.value.clone(),
        }
    }

    /// Identity of the owning object
    #[inline]
    pub fn owner(&self) -> HandleId {
        self.owner
    }

    /// Read-version (private) or write-version (committed)
    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Whether this tranlocal was published
    #[inline]
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Version of the committed ancestor, `None` for fresh state
    pub fn ancestor_version(&self) -> Option<Version> {
        self.ancestor.as_ref().map(|a| a.version)
    }

    /// Handle of the object a privatized copy came from
    pub(crate) fn origin(&self) -> Option<&Handle<S>> {
        self.origin.as_ref()
    }

    /// Field values
    #[inline]
    pub fn value(&self) -> &S {
        &self.value
    }

    /// Mutable field values
    ///
    /// # Panics
    ///
    /// Panics if the tranlocal is committed.
    #[inline]
    pub fn value_mut(&mut self) -> &mut S {
        check_invariant!(!self.committed, "mutating committed state of {}", self.owner);
        &mut self.value
    }

    /// Local classification against the ancestor
    ///
    /// Never returns `Conflict`; that needs the handle's latest version.
    pub fn dirtiness_status(&self) -> DirtinessStatus {
        if self.committed {
            return DirtinessStatus::Committed;
        }
        match &self.ancestor {
            None => DirtinessStatus::Fresh,
            Some(ancestor) if ancestor.value == self.value => DirtinessStatus::Clean,
            Some(_) => DirtinessStatus::Dirty,
        }
    }

    /// Save the current field values
    pub fn take_snapshot(&self) -> TranlocalSnapshot<S> {
        TranlocalSnapshot {
            value: self.value.clone(),
        }
    }

    /// Revert field values to a snapshot
    pub fn restore(&mut self, snapshot: TranlocalSnapshot<S>) {
        check_invariant!(!self.committed, "restoring committed state of {}", self.owner);
        self.value = snapshot.value;
    }

    /// Stamp the read-version when attached to a transaction
    pub(crate) fn bind_read_version(&mut self, read_version: Version) {
        self.version = read_version;
    }

    /// Turn a private copy into immutable committed state
    pub(crate) fn prepare_for_commit(&mut self, write_version: Version) {
        check_invariant!(!self.committed, "{} committed twice", self.owner);
        self.version = write_version;
        self.committed = true;
        self.ancestor = None;
        self.origin = None;
    }
}

impl<S> Tranlocal<S> {
    /// Field values, consuming the tranlocal
    pub(crate) fn into_value(self) -> S {
        self.value
    }
}

impl<S> Deref for Tranlocal<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.value
    }
}

impl<S: TranlocalState> DerefMut for Tranlocal<S> {
    fn deref_mut(&mut self) -> &mut S {
        self.value_mut()
    }
}
