//! Durable identity of a transactional object
//!
//! A [`Handle`] owns:
//! - the retained committed versions of the object (newest last)
//! - a lock word naming the transaction currently committing to it
//! - the retry listeners of transactions blocked on it
//!
//! ## Locking
//!
//! The lock word holds the owner's [`TxnId`], zero when unlocked. Locks are
//! only held by a committing transaction between the policy's lock
//! acquisition and [`Handle::store_and_release_lock`]; they are reentrant
//! per transaction, never per thread.
//!
//! ## Publish ordering
//!
//! A committer locks, advances the clock, appends the new version, then
//! unlocks. A reader checks the lock word before reading the history, so
//! it never observes the clock value of a write-set whose tranlocals are
//! not all published yet.

use crate::latch::Latch;
use crate::tranlocal::{Tranlocal, TranlocalState};
use mvstm_core::{check_invariant, HandleId, StmError, StmResult, TxnId, Version};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Type-erased lock surface of a handle, used by commit lock policies
pub trait Lockable: Send + Sync {
    /// Identity used for lock ordering
    fn handle_id(&self) -> HandleId;

    /// Acquire the write lock without blocking
    fn try_lock(&self, owner: TxnId) -> bool;

    /// Release the lock if `expected_owner` holds it
    fn release_lock(&self, expected_owner: TxnId);

    /// Current lock owner
    fn lock_owner(&self) -> Option<TxnId>;

    /// Version of the newest committed tranlocal
    fn latest_version(&self) -> Option<Version>;
}

struct RetryListener {
    latch: Latch,
    minimum_version: Version,
}

struct HandleInner<S> {
    id: HandleId,
    lock_word: AtomicU64,
    history: RwLock<VecDeque<Arc<Tranlocal<S>>>>,
    history_depth: usize,
    listeners: Mutex<Vec<RetryListener>>,
}

/// Stable, cheaply clonable reference to one transactional object
pub struct Handle<S> {
    inner: Arc<HandleInner<S>>,
}

/// Non-owning handle, for back-references in cyclic structures
pub struct WeakHandle<S> {
    inner: Weak<HandleInner<S>>,
}

impl<S: TranlocalState> Handle<S> {
    pub(crate) fn new(id: HandleId, history_depth: usize) -> Self {
        check_invariant!(history_depth > 0, "{} created without history", id);
        Handle {
            inner: Arc::new(HandleInner {
                id,
                lock_word: AtomicU64::new(0),
                history: RwLock::new(VecDeque::with_capacity(history_depth.min(8))),
                history_depth,
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Identity of the object
    #[inline]
    pub fn id(&self) -> HandleId {
        self.inner.id
    }

    /// Version of the newest committed tranlocal, `None` before the first commit
    pub fn latest_version(&self) -> Option<Version> {
        self.inner.history.read().back().map(|t| t.version())
    }

    /// Oldest committed version still retained
    pub fn oldest_retained_version(&self) -> Option<Version> {
        self.inner.history.read().front().map(|t| t.version())
    }

    /// Number of committed versions currently retained
    pub fn retained_versions(&self) -> usize {
        self.inner.history.read().len()
    }

    /// Current lock owner
    #[inline]
    pub fn lock_owner(&self) -> Option<TxnId> {
        TxnId::from_lock_word(self.inner.lock_word.load(Ordering::SeqCst))
    }

    /// Acquire the write lock without blocking
    ///
    /// Returns true if `owner` now holds the lock, including when it
    /// already did.
    pub fn try_lock(&self, owner: TxnId) -> bool {
        match self.inner.lock_word.compare_exchange(
            0,
            owner.as_u64(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => true,
            Err(current) => current == owner.as_u64(),
        }
    }

    /// Release the lock if `expected_owner` holds it; otherwise do nothing
    pub fn release_lock(&self, expected_owner: TxnId) {
        let _ = self.inner.lock_word.compare_exchange(
            expected_owner.as_u64(),
            0,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Newest committed tranlocal with `version <= read_version`
    ///
    /// # Errors
    ///
    /// - `LoadLocked` if another transaction is publishing to this object
    /// - `LoadUncommitted` if nothing was ever committed
    /// - `LoadTooOldVersion` if every retained version is newer
    pub fn load(&self, read_version: Version) -> StmResult<Arc<Tranlocal<S>>> {
        if let Some(owner) = self.lock_owner() {
            return Err(StmError::LoadLocked {
                handle: self.id(),
                owner,
            });
        }

        let history = self.inner.history.read();
        let oldest = match history.front() {
            Some(t) => t.version(),
            None => return Err(StmError::LoadUncommitted { handle: self.id() }),
        };

        history
            .iter()
            .rev()
            .find(|t| t.version() <= read_version)
            .cloned()
            .ok_or(StmError::LoadTooOldVersion {
                handle: self.id(),
                requested: read_version,
                oldest_retained: oldest,
            })
    }

    /// Private, mutable copy of the version [`Handle::load`] would return
    pub fn privatize(&self, read_version: Version) -> StmResult<Tranlocal<S>> {
        let committed = self.load(read_version)?;
        Ok(Tranlocal::privatize(self, &committed, read_version))
    }

    /// Publish `tranlocal` as the newest committed version, then unlock
    ///
    /// Must be called by the lock owner. Listeners waiting for
    /// `write_version` or older are opened after the lock is released.
    pub fn store_and_release_lock(
        &self,
        mut tranlocal: Tranlocal<S>,
        write_version: Version,
        owner: TxnId,
    ) {
        check_invariant!(
            self.lock_owner() == Some(owner),
            "{} published to {} without holding its lock",
            owner,
            self.id()
        );
        check_invariant!(
            tranlocal.owner() == self.id(),
            "tranlocal of {} published to {}",
            tranlocal.owner(),
            self.id()
        );

        tranlocal.prepare_for_commit(write_version);
        {
            let mut history = self.inner.history.write();
            if let Some(latest) = history.back() {
                check_invariant!(
                    latest.version() < write_version,
                    "{} version regressed from {} to {}",
                    self.id(),
                    latest.version(),
                    write_version
                );
            }
            history.push_back(Arc::new(tranlocal));
            while history.len() > self.inner.history_depth {
                history.pop_front();
            }
        }

        self.release_lock(owner);
        self.wake_listeners(write_version);
    }

    /// Ask to be woken once a version `>= minimum_version` is committed
    ///
    /// If such a version already exists the latch is opened immediately,
    /// so a caller that registers and then waits can never miss the write.
    ///
    /// Returns false without registering when no write can ever arrive:
    /// an object that was never committed is only reachable through the
    /// transaction that created it.
    pub fn register_retry_listener(&self, latch: &Latch, minimum_version: Version) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let latest = match self.latest_version() {
            Some(latest) => latest,
            None => return false,
        };
        if latest >= minimum_version {
            latch.open();
            return true;
        }
        listeners.retain(|l| !l.latch.is_open());
        listeners.push(RetryListener {
            latch: latch.clone(),
            minimum_version,
        });
        true
    }

    /// Number of retry listeners still waiting on this object
    pub fn pending_listeners(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .iter()
            .filter(|l| !l.latch.is_open())
            .count()
    }

    fn wake_listeners(&self, write_version: Version) {
        let mut listeners = self.inner.listeners.lock();
        listeners.retain(|l| {
            if l.minimum_version <= write_version {
                l.latch.open();
                false
            } else {
                !l.latch.is_open()
            }
        });
    }

    /// Newest committed value, read outside any transaction
    pub fn atomic_get(&self) -> StmResult<S> {
        self.inner
            .history
            .read()
            .back()
            .map(|t| t.value().clone())
            .ok_or(StmError::NoCommittedDataFound { handle: self.id() })
    }

    /// Non-owning reference to this object
    pub fn downgrade(&self) -> WeakHandle<S> {
        WeakHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same object
    pub fn same_object(&self, other: &Handle<S>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<S> Handle<S> {
    /// Empty the history of an object no one else refers to
    ///
    /// Returns the values of the retained versions, or `None` while other
    /// handles (strong or weak) to the object exist. The handle is left
    /// with no committed state.
    pub fn take_retained_values(&mut self) -> Option<Vec<S>> {
        let inner = Arc::get_mut(&mut self.inner)?;
        let values = inner
            .history
            .get_mut()
            .drain(..)
            .filter_map(|t| Arc::try_unwrap(t).ok())
            .map(Tranlocal::into_value)
            .collect();
        Some(values)
    }

    /// Release a linked structure without recursing through it
    ///
    /// Dropping the last handle of a chain frees the next object from
    /// inside the drop of the previous one, so a long enough chain
    /// overflows the stack. This walks the structure with an explicit
    /// worklist instead: `unlink` receives every reclaimed value and
    /// pushes the handles it owns. Objects still referenced from
    /// elsewhere are left alone.
    ///
    /// ```
    /// use mvstm_concurrency::{Handle, Tranlocal, Transaction, TransactionManager};
    /// use std::sync::Arc;
    ///
    /// #[derive(Clone, PartialEq)]
    /// struct Link {
    ///     next: Option<Handle<Link>>,
    /// }
    ///
    /// let manager = Arc::new(TransactionManager::default());
    /// let mut txn = Transaction::begin(manager, "chain", false);
    /// let mut head = txn.attach_new(Tranlocal::fresh(Link { next: None })).unwrap();
    /// for _ in 0..1_000 {
    ///     head = txn.attach_new(Tranlocal::fresh(Link { next: Some(head) })).unwrap();
    /// }
    /// txn.commit().unwrap();
    ///
    /// head.release_chain(|link, pending| pending.extend(link.next));
    /// ```
    pub fn release_chain<F>(self, mut unlink: F)
    where
        F: FnMut(S, &mut Vec<Handle<S>>),
    {
        let mut pending = vec![self];
        while let Some(mut handle) = pending.pop() {
            if let Some(values) = handle.take_retained_values() {
                for value in values {
                    unlink(value, &mut pending);
                }
            }
        }
    }
}

impl<S> WeakHandle<S> {
    /// Recover the handle if the object is still alive
    pub fn upgrade(&self) -> Option<Handle<S>> {
        self.inner.upgrade().map(|inner| Handle { inner })
    }
}

impl<S: TranlocalState> Lockable for Handle<S> {
    fn handle_id(&self) -> HandleId {
        self.id()
    }

    fn try_lock(&self, owner: TxnId) -> bool {
        Handle::try_lock(self, owner)
    }

    fn release_lock(&self, expected_owner: TxnId) {
        Handle::release_lock(self, expected_owner)
    }

    fn lock_owner(&self) -> Option<TxnId> {
        Handle::lock_owner(self)
    }

    fn latest_version(&self) -> Option<Version> {
        Handle::latest_version(self)
    }
}

impl<S> Clone for Handle<S> {
    fn clone(&self) -> Self {
        Handle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> Clone for WeakHandle<S> {
    fn clone(&self) -> Self {
        WeakHandle {
            inner: Weak::clone(&self.inner),
        }
    }
}

// Identity semantics: two handles are equal when they name the same object.
// Field values never take part, which keeps comparisons of object graphs
// (including cyclic ones) shallow.
impl<S> PartialEq for Handle<S> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<S> Eq for Handle<S> {}

impl<S> std::hash::Hash for Handle<S> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl<S> PartialEq for WeakHandle<S> {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}

impl<S> std::fmt::Debug for Handle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.inner.id)
            .field(
                "lock_owner",
                &TxnId::from_lock_word(self.inner.lock_word.load(Ordering::Relaxed)),
            )
            .finish()
    }
}

impl<S> std::fmt::Debug for WeakHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakHandle")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}
