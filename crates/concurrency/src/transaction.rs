//! Transaction state machine
//!
//! A [`Transaction`] reads a consistent snapshot fixed by its read-version
//! and buffers every change in private tranlocals until [`Transaction::commit`].
//!
//! ## States
//!
//! ```text
//! Active ──commit()──▶ Committed
//!    │
//!    ├──abort()──▶ Aborted
//!    │
//!    └──abort_and_retry()──▶ (blocks) ──▶ Active with a new read-version
//! ```
//!
//! Every operation on a terminal transaction fails with
//! `DeadTransaction`, except a repeated `commit()` after commit (returns
//! the same version) and a repeated `abort()` after abort (no-op).
//!
//! ## Flavors
//!
//! | Flavor | `load` | Writes | `abort_and_retry` |
//! |--------|--------|--------|-------------------|
//! | read-only | shares the committed tranlocal | `Readonly` error | `Readonly` error |
//! | update | private copy per object | buffered until commit | blocks on a latch |
//!
//! A transaction is `Send` but not `Sync`: it may move between threads,
//! one thread at a time.

use crate::handle::{Handle, Lockable};
use crate::latch::Latch;
use crate::manager::TransactionManager;
use crate::object::TransactionalObject;
use crate::policy::{CommitCandidate, LockOutcome};
use crate::snapshot::AttachedSnapshot;
use crate::tranlocal::{Tranlocal, TranlocalSnapshot, TranlocalState};
use mvstm_core::{
    check_invariant, DirtinessStatus, HandleId, StmError, StmResult, TxnId, Version,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    /// Running; loads and writes are allowed
    Active,
    /// Committed; terminal
    Committed,
    /// Aborted; terminal
    Aborted,
}

impl TransactionStatus {
    /// Name used in errors and log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Active => "active",
            TransactionStatus::Committed => "committed",
            TransactionStatus::Aborted => "aborted",
        }
    }

    /// Whether the transaction finished
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Active)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Attached entries
// ============================================================================

/// Type-erased view of one attached object
pub(crate) trait AttachedEntry: Send {
    fn handle_id(&self) -> HandleId;

    /// Local dirtiness, upgraded to `Conflict` when the object moved on
    fn dirtiness_status(&self) -> DirtinessStatus;

    fn as_candidate(&self) -> &dyn CommitCandidate;

    fn lockable_handle(&self) -> Box<dyn Lockable>;

    /// False if the object can never reach `minimum_version`
    fn register_retry_listener(&self, latch: &Latch, minimum_version: Version) -> bool;

    fn take_snapshot(&self) -> Box<dyn Any + Send>;

    fn restore(&mut self, snapshot: Box<dyn Any + Send>);

    /// Publish the private copy; the caller holds the lock
    fn publish(self: Box<Self>, write_version: Version, owner: TxnId);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

enum Slot<S> {
    /// Committed state shared with the handle (read-only transactions)
    Shared(Arc<Tranlocal<S>>),
    /// Private copy owned by this transaction
    Private(Tranlocal<S>),
}

struct Entry<S> {
    handle: Handle<S>,
    slot: Slot<S>,
}

impl<S: TranlocalState> Entry<S> {
    fn tranlocal(&self) -> &Tranlocal<S> {
        match &self.slot {
            Slot::Shared(committed) => &**committed,
            Slot::Private(private) => private,
        }
    }

    fn tranlocal_mut(&mut self, read_version: Version) -> &mut Tranlocal<S> {
        if let Slot::Shared(committed) = &self.slot {
            let private = Tranlocal::privatize(&self.handle, committed, read_version);
            self.slot = Slot::Private(private);
        }
        match &mut self.slot {
            Slot::Private(private) => private,
            Slot::Shared(_) => unreachable!("slot was privatized above"),
        }
    }
}

impl<S: TranlocalState> CommitCandidate for Entry<S> {
    fn lockable(&self) -> &dyn Lockable {
        &self.handle
    }

    fn ancestor_version(&self) -> Option<Version> {
        match &self.slot {
            Slot::Shared(committed) => Some(committed.version()),
            Slot::Private(private) => private.ancestor_version(),
        }
    }
}

impl<S: TranlocalState> AttachedEntry for Entry<S> {
    fn handle_id(&self) -> HandleId {
        self.handle.id()
    }

    fn dirtiness_status(&self) -> DirtinessStatus {
        match &self.slot {
            Slot::Shared(_) => DirtinessStatus::Committed,
            Slot::Private(private) => match private.dirtiness_status() {
                DirtinessStatus::Dirty
                    if self.handle.latest_version() != private.ancestor_version() =>
                {
                    DirtinessStatus::Conflict
                }
                status => status,
            },
        }
    }

    fn as_candidate(&self) -> &dyn CommitCandidate {
        self
    }

    fn lockable_handle(&self) -> Box<dyn Lockable> {
        Box::new(self.handle.clone())
    }

    fn register_retry_listener(&self, latch: &Latch, minimum_version: Version) -> bool {
        self.handle.register_retry_listener(latch, minimum_version)
    }

    fn take_snapshot(&self) -> Box<dyn Any + Send> {
        let snapshot: Option<TranlocalSnapshot<S>> = match &self.slot {
            Slot::Shared(_) => None,
            Slot::Private(private) => Some(private.take_snapshot()),
        };
        Box::new(snapshot)
    }

    fn restore(&mut self, snapshot: Box<dyn Any + Send>) {
        let snapshot = match snapshot.downcast::<Option<TranlocalSnapshot<S>>>() {
            Ok(snapshot) => *snapshot,
            Err(_) => panic!(
                "invariant violated: snapshot of {} has a different state type",
                self.handle.id()
            ),
        };
        if let (Slot::Private(private), Some(snapshot)) = (&mut self.slot, snapshot) {
            private.restore(snapshot);
        }
    }

    fn publish(self: Box<Self>, write_version: Version, owner: TxnId) {
        let Entry { handle, slot } = *self;
        match slot {
            Slot::Private(private) => handle.store_and_release_lock(private, write_version, owner),
            Slot::Shared(_) => check_invariant!(
                false,
                "{} tried to publish shared committed state of {}",
                owner,
                handle.id()
            ),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn downcast<'a, S: TranlocalState>(entry: &'a (dyn AttachedEntry + 'static)) -> &'a Entry<S> {
    let id = entry.handle_id();
    match entry.as_any().downcast_ref::<Entry<S>>() {
        Some(entry) => entry,
        None => panic!("invariant violated: {} attached with a different state type", id),
    }
}

fn downcast_mut<'a, S: TranlocalState>(
    entry: &'a mut (dyn AttachedEntry + 'static),
) -> &'a mut Entry<S> {
    let id = entry.handle_id();
    match entry.as_any_mut().downcast_mut::<Entry<S>>() {
        Some(entry) => entry,
        None => panic!("invariant violated: {} attached with a different state type", id),
    }
}

/// Releases commit locks still held when dropped
///
/// Publishing releases each lock as it goes; the guard covers the locks
/// left behind if publishing unwinds.
struct CommitLockGuard {
    owner: TxnId,
    locks: Vec<Box<dyn Lockable>>,
}

impl Drop for CommitLockGuard {
    fn drop(&mut self) {
        for lock in &self.locks {
            lock.release_lock(self.owner);
        }
    }
}

// ============================================================================
// Transaction
// ============================================================================

/// One unit of transactional work
pub struct Transaction {
    id: TxnId,
    family: Arc<str>,
    readonly: bool,
    status: TransactionStatus,
    read_version: Version,
    commit_version: Option<Version>,
    attached: FxHashMap<HandleId, Box<dyn AttachedEntry>>,
    snapshots: Vec<AttachedSnapshot>,
    /// Entries detached by an or-else rollback; still watched on retry
    retry_watch: Vec<Box<dyn AttachedEntry>>,
    manager: Arc<TransactionManager>,
}

impl Transaction {
    /// Start a transaction reading at the manager's current version
    pub fn begin(
        manager: Arc<TransactionManager>,
        family: impl Into<Arc<str>>,
        readonly: bool,
    ) -> Self {
        let id = manager.next_txn_id();
        let read_version = manager.current_version();
        let family = family.into();
        manager.statistics().record_start(readonly);
        debug!(txn = %id, family = %family, read_version, readonly, "transaction started");

        Transaction {
            id,
            family,
            readonly,
            status: TransactionStatus::Active,
            read_version,
            commit_version: None,
            attached: FxHashMap::default(),
            snapshots: Vec::new(),
            retry_watch: Vec::new(),
            manager,
        }
    }

    /// Transaction id; changes when the transaction restarts after a retry
    #[inline]
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Family name given at start
    pub fn family_name(&self) -> &str {
        &self.family
    }

    /// Version of the snapshot this transaction reads
    #[inline]
    pub fn read_version(&self) -> Version {
        self.read_version
    }

    /// Write-version of a committed transaction
    pub fn commit_version(&self) -> Option<Version> {
        self.commit_version
    }

    /// Lifecycle state
    #[inline]
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Whether this is a read-only transaction
    #[inline]
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Number of objects loaded or attached
    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    /// Manager shared with every transaction of the same Stm
    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    fn ensure_active(&self) -> StmResult<()> {
        if self.status == TransactionStatus::Active {
            Ok(())
        } else {
            Err(StmError::DeadTransaction {
                txn: self.id,
                status: self.status.as_str(),
            })
        }
    }

    fn ensure_update(&self) -> StmResult<()> {
        if self.readonly {
            Err(StmError::Readonly { txn: self.id })
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Committed state visible at the read-version, waiting out a
    /// concurrent publish for a bounded number of spins
    fn load_committed<S: TranlocalState>(
        &self,
        handle: &Handle<S>,
    ) -> StmResult<Arc<Tranlocal<S>>> {
        let mut spins = 0u32;
        loop {
            match handle.load(self.read_version) {
                Ok(committed) => return Ok(committed),
                Err(StmError::LoadLocked { .. })
                    if spins < self.manager.config().load_lock_spins =>
                {
                    spins += 1;
                    std::hint::spin_loop();
                }
                Err(e) => {
                    self.manager.statistics().record_load_failure();
                    trace!(txn = %self.id, handle = %handle.id(), error = %e, "load failed");
                    return Err(e);
                }
            }
        }
    }

    fn ensure_attached<S: TranlocalState>(&mut self, handle: &Handle<S>) -> StmResult<()> {
        let id = handle.id();
        if self.attached.contains_key(&id) {
            return Ok(());
        }

        let committed = self.load_committed(handle)?;
        let slot = if self.readonly {
            Slot::Shared(committed)
        } else {
            Slot::Private(Tranlocal::privatize(handle, &committed, self.read_version))
        };
        self.attached.insert(
            id,
            Box::new(Entry {
                handle: handle.clone(),
                slot,
            }),
        );
        Ok(())
    }

    fn entry<S: TranlocalState>(&self, id: &HandleId) -> Option<&Entry<S>> {
        self.attached.get(id).map(|e| downcast::<S>(&**e))
    }

    /// Tranlocal of `handle` as seen by this transaction
    ///
    /// The first load of an object reads the newest committed version not
    /// newer than the read-version; later loads return the same
    /// tranlocal, including any changes made to it.
    ///
    /// # Errors
    ///
    /// `DeadTransaction`, or the load errors of [`Handle::load`].
    pub fn load<S: TranlocalState>(&mut self, handle: &Handle<S>) -> StmResult<&Tranlocal<S>> {
        self.ensure_active()?;
        self.ensure_attached(handle)?;
        match self.entry::<S>(&handle.id()) {
            Some(entry) => Ok(entry.tranlocal()),
            None => Err(StmError::LoadUncommitted { handle: handle.id() }),
        }
    }

    /// Mutable private copy of `handle`
    ///
    /// # Errors
    ///
    /// `Readonly` in a read-only transaction, otherwise as [`Transaction::load`].
    pub fn load_mut<S: TranlocalState>(
        &mut self,
        handle: &Handle<S>,
    ) -> StmResult<&mut Tranlocal<S>> {
        self.ensure_active()?;
        self.ensure_update()?;
        self.ensure_attached(handle)?;

        let read_version = self.read_version;
        match self.attached.get_mut(&handle.id()) {
            Some(entry) => Ok(downcast_mut::<S>(&mut **entry).tranlocal_mut(read_version)),
            None => Err(StmError::LoadUncommitted { handle: handle.id() }),
        }
    }

    /// [`Transaction::load`] for an optional reference; `None` loads nothing
    pub fn load_optional<S: TranlocalState>(
        &mut self,
        handle: Option<&Handle<S>>,
    ) -> StmResult<Option<&Tranlocal<S>>> {
        match handle {
            Some(handle) => self.load(handle).map(Some),
            None => {
                self.ensure_active()?;
                Ok(None)
            }
        }
    }

    /// Copy of the object's value
    pub fn read<S: TranlocalState>(&mut self, handle: &Handle<S>) -> StmResult<S> {
        self.load(handle).map(|t| t.value().clone())
    }

    /// Replace the object's value
    pub fn write<S: TranlocalState>(&mut self, handle: &Handle<S>, value: S) -> StmResult<()> {
        *self.load_mut(handle)?.value_mut() = value;
        Ok(())
    }

    /// Update the object's value in place
    pub fn modify<S, R, F>(&mut self, handle: &Handle<S>, f: F) -> StmResult<R>
    where
        S: TranlocalState,
        F: FnOnce(&mut S) -> R,
    {
        Ok(f(self.load_mut(handle)?.value_mut()))
    }

    /// Rebuild the user-facing object from its tranlocal state
    pub fn materialize<T: TransactionalObject>(
        &mut self,
        handle: &Handle<T::State>,
    ) -> StmResult<T> {
        self.read(handle).map(T::from_state)
    }

    // ------------------------------------------------------------------------
    // Attaching
    // ------------------------------------------------------------------------

    /// Register a brand-new (or clean, privatized) tranlocal
    ///
    /// Returns the handle of the object. A fresh object becomes visible to
    /// other transactions when this one commits.
    ///
    /// # Panics
    ///
    /// Panics if the tranlocal is neither `Fresh` nor `Clean`, or if its
    /// object is already attached.
    pub fn attach_new<S: TranlocalState>(
        &mut self,
        mut tranlocal: Tranlocal<S>,
    ) -> StmResult<Handle<S>> {
        self.ensure_active()?;
        self.ensure_update()?;

        let id = tranlocal.owner();
        let status = tranlocal.dirtiness_status();
        check_invariant!(
            status.is_attachable(),
            "{} cannot attach {} tranlocal of {}",
            self.id,
            status,
            id
        );
        check_invariant!(
            !self.attached.contains_key(&id),
            "{} attached {} twice",
            self.id,
            id
        );

        let handle = match tranlocal.origin() {
            Some(origin) => origin.clone(),
            None => Handle::new(id, self.manager.config().history_depth),
        };
        tranlocal.bind_read_version(self.read_version);
        self.attached.insert(
            id,
            Box::new(Entry {
                handle: handle.clone(),
                slot: Slot::Private(tranlocal),
            }),
        );
        trace!(txn = %self.id, handle = %id, status = %status, "attached new tranlocal");
        Ok(handle)
    }

    /// Create a new transactional object from a user value
    pub fn attach_object<T: TransactionalObject>(
        &mut self,
        object: T,
    ) -> StmResult<Handle<T::State>> {
        self.attach_new(Tranlocal::fresh(object.into_state()))
    }

    /// Whether `handle` was loaded or attached by this transaction
    pub fn is_attached<S>(&self, handle: &Handle<S>) -> StmResult<bool>
    where
        S: TranlocalState,
    {
        self.ensure_active()?;
        Ok(self.attached.contains_key(&handle.id()))
    }

    // ------------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------------

    /// Publish every changed object atomically
    ///
    /// Returns the write-version, or the read-version when nothing needed
    /// writing. Calling it again after success returns the same version.
    ///
    /// # Errors
    ///
    /// - `WriteConflict` if a changed object was committed by someone else
    ///   since this transaction read it
    /// - `FailedToObtainLocks` if the commit locks stayed contended
    /// - `DeadTransaction` after abort
    ///
    /// The transaction is aborted on any error, and no lock survives it.
    pub fn commit(&mut self) -> StmResult<Version> {
        match self.status {
            TransactionStatus::Committed => {
                return Ok(self.commit_version.unwrap_or(self.read_version))
            }
            TransactionStatus::Aborted => return self.ensure_active().map(|_| self.read_version),
            TransactionStatus::Active => {}
        }

        if self.readonly {
            self.finish(self.read_version);
            self.manager.statistics().record_readonly_commit();
            debug!(
                txn = %self.id,
                family = %self.family,
                read_version = self.read_version,
                "read-only transaction committed"
            );
            return Ok(self.read_version);
        }

        let mut write_ids: SmallVec<[HandleId; 16]> = SmallVec::new();
        let mut conflict = None;
        for (id, entry) in &self.attached {
            match entry.dirtiness_status() {
                DirtinessStatus::Conflict => {
                    conflict = Some(*id);
                    break;
                }
                status if status.needs_write() => write_ids.push(*id),
                _ => {}
            }
        }
        if let Some(handle) = conflict {
            return Err(self.fail_with_conflict(handle));
        }

        if write_ids.is_empty() {
            self.finish(self.read_version);
            self.manager.statistics().record_empty_commit();
            debug!(
                txn = %self.id,
                family = %self.family,
                read_version = self.read_version,
                "empty commit"
            );
            return Ok(self.read_version);
        }

        let outcome = {
            let candidates: SmallVec<[&dyn CommitCandidate; 16]> = write_ids
                .iter()
                .filter_map(|id| self.attached.get(id))
                .map(|entry| entry.as_candidate())
                .collect();
            self.manager
                .policy()
                .try_lock_all_and_detect_conflicts(&candidates, self.id)
        };

        match outcome {
            LockOutcome::Success => {}
            LockOutcome::Conflict(handle) => return Err(self.fail_with_conflict(handle)),
            LockOutcome::Failure => {
                self.discard();
                self.manager.statistics().record_lock_failure();
                self.manager.statistics().record_abort();
                debug!(txn = %self.id, family = %self.family, "commit failed to obtain locks");
                return Err(StmError::FailedToObtainLocks { txn: self.id });
            }
        }

        let guard = CommitLockGuard {
            owner: self.id,
            locks: write_ids
                .iter()
                .filter_map(|id| self.attached.get(id))
                .map(|entry| entry.lockable_handle())
                .collect(),
        };

        let write_version = self.manager.clock().increment_and_get();
        let mut attached = std::mem::take(&mut self.attached);
        for id in &write_ids {
            if let Some(entry) = attached.remove(id) {
                entry.publish(write_version, self.id);
            }
        }
        drop(guard);

        self.finish(write_version);
        self.manager.statistics().record_commit(write_ids.len());
        debug!(
            txn = %self.id,
            family = %self.family,
            read_version = self.read_version,
            write_version,
            writes = write_ids.len(),
            "transaction committed"
        );
        Ok(write_version)
    }

    fn finish(&mut self, version: Version) {
        self.attached.clear();
        self.snapshots.clear();
        self.retry_watch.clear();
        self.status = TransactionStatus::Committed;
        self.commit_version = Some(version);
    }

    fn discard(&mut self) {
        self.attached.clear();
        self.snapshots.clear();
        self.retry_watch.clear();
        self.status = TransactionStatus::Aborted;
    }

    fn fail_with_conflict(&mut self, handle: HandleId) -> StmError {
        self.discard();
        self.manager.statistics().record_write_conflict();
        self.manager.statistics().record_abort();
        debug!(txn = %self.id, family = %self.family, handle = %handle, "write conflict");
        StmError::WriteConflict { handle }
    }

    /// Discard every change
    ///
    /// Aborting twice is a no-op.
    ///
    /// # Errors
    ///
    /// `DeadTransaction` if the transaction already committed.
    pub fn abort(&mut self) -> StmResult<()> {
        match self.status {
            TransactionStatus::Aborted => Ok(()),
            TransactionStatus::Committed => self.ensure_active(),
            TransactionStatus::Active => {
                self.discard();
                self.manager.statistics().record_abort();
                debug!(txn = %self.id, family = %self.family, "transaction aborted");
                Ok(())
            }
        }
    }

    /// Abort, block until an object this transaction read changes, then
    /// restart with a fresh read-version
    ///
    /// # Errors
    ///
    /// - `Readonly` for a read-only transaction
    /// - `NoProgressPossible` if no object this transaction read can ever
    ///   change (nothing read, or only objects it created itself); the
    ///   transaction is aborted because no write could ever wake it
    pub fn abort_and_retry(&mut self) -> StmResult<()> {
        self.retry_and_wait(None)
    }

    /// [`Transaction::abort_and_retry`] that gives up after `timeout`
    ///
    /// # Errors
    ///
    /// `RetryTimeout` if no read object changed in time; the transaction
    /// stays aborted.
    pub fn abort_and_retry_timeout(&mut self, timeout: Duration) -> StmResult<()> {
        self.retry_and_wait(Some(timeout))
    }

    fn retry_and_wait(&mut self, timeout: Option<Duration>) -> StmResult<()> {
        self.ensure_active()?;
        self.ensure_update()?;

        let latch = Latch::new();
        let minimum_version = self.read_version + 1;
        let mut watched = 0usize;
        for entry in self.attached.values().chain(self.retry_watch.iter()) {
            if entry.register_retry_listener(&latch, minimum_version) {
                watched += 1;
            }
        }

        let txn = self.id;
        if watched == 0 {
            self.discard();
            self.manager.statistics().record_abort();
            debug!(txn = %txn, family = %self.family, "retry with nothing that can change");
            return Err(StmError::NoProgressPossible { txn });
        }

        self.discard();
        self.manager.statistics().record_retry();
        debug!(
            txn = %txn,
            family = %self.family,
            minimum_version,
            watched,
            "waiting for retry wake-up"
        );

        match timeout {
            None => latch.await_open(),
            Some(timeout) => {
                if !latch.await_timeout(timeout) {
                    debug!(txn = %txn, family = %self.family, "retry wake-up timed out");
                    return Err(StmError::RetryTimeout { txn });
                }
            }
        }

        self.restart();
        debug!(
            previous = %txn,
            txn = %self.id,
            read_version = self.read_version,
            "woken for retry"
        );
        Ok(())
    }

    fn restart(&mut self) {
        self.id = self.manager.next_txn_id();
        self.read_version = self.manager.current_version();
        self.status = TransactionStatus::Active;
        self.commit_version = None;
        self.attached.clear();
        self.snapshots.clear();
        self.retry_watch.clear();
        self.manager.statistics().record_start(self.readonly);
    }

    // ------------------------------------------------------------------------
    // Or-else branches
    // ------------------------------------------------------------------------

    /// Save the state of every attached object before an `or` branch
    pub fn start_or(&mut self) -> StmResult<()> {
        self.ensure_active()?;
        let entries = self
            .attached
            .iter()
            .map(|(id, entry)| (*id, entry.take_snapshot()))
            .collect();
        self.snapshots.push(AttachedSnapshot::new(entries));
        Ok(())
    }

    /// Keep the changes of the current `or` branch
    pub fn end_or(&mut self) -> StmResult<()> {
        self.ensure_active()?;
        let popped = self.snapshots.pop();
        check_invariant!(popped.is_some(), "{} ended an or-branch it never started", self.id);
        Ok(())
    }

    /// Roll back the current `or` branch before running its `else`
    ///
    /// Objects attached since `start_or` are detached; the others get
    /// their saved values back. Detached objects stay watched, so a
    /// later retry still wakes when one of them changes.
    pub fn end_or_and_start_else(&mut self) -> StmResult<()> {
        self.ensure_active()?;
        let popped = self.snapshots.pop();
        check_invariant!(popped.is_some(), "{} ended an or-branch it never started", self.id);

        if let Some(mut snapshot) = popped {
            let detached: SmallVec<[HandleId; 16]> = self
                .attached
                .keys()
                .filter(|id| !snapshot.contains(id))
                .copied()
                .collect();
            for id in &detached {
                if let Some(entry) = self.attached.remove(id) {
                    self.retry_watch.push(entry);
                }
            }
            for (id, entry) in self.attached.iter_mut() {
                if let Some(saved) = snapshot.take(id) {
                    entry.restore(saved);
                }
            }
            trace!(
                txn = %self.id,
                restored = self.attached.len(),
                detached = detached.len(),
                remaining = snapshot.len(),
                "or-branch rolled back"
            );
        }
        Ok(())
    }

    /// Depth of nested `or` branches
    pub fn or_depth(&self) -> usize {
        self.snapshots.len()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.status == TransactionStatus::Active {
            self.discard();
            self.manager.statistics().record_abort();
            debug!(txn = %self.id, family = %self.family, "active transaction dropped, aborted");
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("family", &self.family)
            .field("readonly", &self.readonly)
            .field("status", &self.status)
            .field("read_version", &self.read_version)
            .field("attached", &self.attached.len())
            .finish()
    }
}

/// Signal that the current attempt cannot proceed and should block until
/// something it read changes
pub fn retry<T>() -> StmResult<T> {
    Err(StmError::Retry)
}

/// [`retry`] unless `condition` holds
pub fn guard(condition: bool) -> StmResult<()> {
    if condition {
        Ok(())
    } else {
        retry()
    }
}
