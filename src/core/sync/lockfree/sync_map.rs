/*!
 * SyncMap
 * Read-mostly concurrent map: lock-free reads of a published snapshot,
 * mutex-serialized writes
 */

use crate::core::errors::SyncResult;
use crate::core::sync::config::SyncMapConfig;
use crate::core::sync::hazard::Domain;
use ahash::RandomState;
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::Arc;
use tracing::debug;

type Table<K, V> = HashMap<K, V, RandomState>;

/// Immutable point-in-time copy published for lock-free readers
struct Snapshot<K, V> {
    read_only: Arc<Table<K, V>>,
    /// Set by writers; readers that see it take the locked path
    dirty: AtomicBool,
}

struct MutableState<K, V> {
    /// Shared copy-on-write with the latest snapshot
    map: Arc<Table<K, V>>,
    /// Locked lookups since the last publish
    operations: usize,
}

/// Concurrent map optimized for read-heavy, insert-only workloads
///
/// # Performance
///
/// - **Reads (clean snapshot)**: hazard-protected pointer load plus a hash
///   lookup; no lock, no allocation
/// - **Reads (dirty or no snapshot)**: mutex + hash lookup; every
///   `refresh_interval` of these republishes a clean snapshot
/// - **Writes**: always under the mutex; the first write after a publish
///   copies the table
///
/// Writes are visible immediately through the locked path. Lock-free
/// readers see them once the next snapshot is published, and are steered
/// to the locked path in the meantime by the `dirty` flag.
///
/// # Example
///
/// ```
/// use hazard_sync::SyncMap;
///
/// let map = SyncMap::new();
/// assert!(map.insert("a", 1));
/// assert!(!map.insert("a", 2));
/// assert_eq!(map.lookup("a"), Some(1));
/// ```
pub struct SyncMap<K, V> {
    snapshot: AtomicPtr<Snapshot<K, V>>,
    state: Mutex<MutableState<K, V>>,
    domain: Domain,
    config: SyncMapConfig,
}

// Safety: the snapshot pointer is only dereferenced under hazard protection
// or the state mutex; readers on other threads share `&K` / `&V`
unsafe impl<K: Send + Sync, V: Send + Sync> Send for SyncMap<K, V> {}
unsafe impl<K: Send + Sync, V: Send + Sync> Sync for SyncMap<K, V> {}

impl<K, V> SyncMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a map reclaiming snapshots through the global domain
    pub fn new() -> Self {
        Self::with_domain(Domain::global().clone())
    }

    /// Create a map reclaiming snapshots through `domain`
    pub fn with_domain(domain: Domain) -> Self {
        Self::build(domain, SyncMapConfig::default())
    }

    /// Create a map with an explicit domain and validated configuration
    pub fn with_config(domain: Domain, config: SyncMapConfig) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self::build(domain, config))
    }

    fn build(domain: Domain, config: SyncMapConfig) -> Self {
        Self {
            snapshot: AtomicPtr::new(ptr::null_mut()),
            state: Mutex::new(MutableState {
                map: Arc::new(Table::default()),
                operations: 0,
            }),
            domain,
            config,
        }
    }

    /// Look up `key`, lock-free when a clean snapshot is published
    pub fn lookup<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.lookup_snapshot(key) {
            Some(hit) => hit,
            None => self.lookup_locked(key),
        }
    }

    /// Outer `None` means the snapshot cannot answer and the caller must lock
    fn lookup_snapshot<Q>(&self, key: &Q) -> Option<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.snapshot.load(Ordering::Relaxed).is_null() {
            return None;
        }

        self.domain.with_local(|participant| {
            // No free slot (deeply nested protection on this thread): lock instead
            let guard = participant.protect(&self.snapshot)?;
            // SAFETY: snapshots are freed only through `self.domain`, after
            // being unlinked from `self.snapshot`.
            let snapshot = unsafe { guard.as_ref() }?;
            if snapshot.dirty.load(Ordering::Acquire) {
                return None;
            }
            Some(snapshot.read_only.get(key).cloned())
        })
    }

    fn lookup_locked<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.state.lock();
        state.operations += 1;
        let value = state.map.get(key).cloned();

        if state.operations >= self.config.refresh_interval {
            self.publish_locked(&mut state);
        }
        value
    }

    /// Insert without overwriting; returns `false` if `key` already exists
    pub fn insert(&self, key: K, value: V) -> bool {
        let mut state = self.state.lock();
        if state.map.contains_key(&key) {
            return false;
        }

        let current = self.snapshot.load(Ordering::Acquire);
        if !current.is_null() {
            // SAFETY: snapshots are swapped and retired only under `state`,
            // which we hold, so `current` cannot be reclaimed here.
            unsafe { (*current).dirty.store(true, Ordering::Release) };
        }

        Arc::make_mut(&mut state.map).insert(key, value);
        true
    }

    /// Publish a clean snapshot now instead of waiting for the interval
    pub fn refresh(&self) {
        let mut state = self.state.lock();
        self.publish_locked(&mut state);
    }

    fn publish_locked(&self, state: &mut MutableState<K, V>) {
        state.operations = 0;

        let fresh = Box::into_raw(Box::new(Snapshot {
            read_only: state.map.clone(),
            dirty: AtomicBool::new(false),
        }));
        let old = self.snapshot.swap(fresh, Ordering::AcqRel);
        if !old.is_null() {
            // SAFETY: `old` is unlinked and only ever retired here.
            unsafe { self.domain.retire_box(old) };
        }

        debug!(
            domain = self.domain.id(),
            entries = state.map.len(),
            "Published sync map snapshot"
        );
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.state.lock().map.contains_key(key)
    }

    /// Number of entries (takes the lock)
    pub fn len(&self) -> usize {
        self.state.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether lock-free lookups can currently be served
    pub fn has_clean_snapshot(&self) -> bool {
        let _state = self.state.lock();
        let current = self.snapshot.load(Ordering::Acquire);
        // SAFETY: see insert; the lock pins the current snapshot.
        !current.is_null() && unsafe { !(*current).dirty.load(Ordering::Acquire) }
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn config(&self) -> &SyncMapConfig {
        &self.config
    }
}

impl<K, V> Default for SyncMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for SyncMap<K, V> {
    fn drop(&mut self) {
        let current = *self.snapshot.get_mut();
        if !current.is_null() {
            // SAFETY: `&mut self` means no lookup is running, and lookups
            // drop their hazard before returning.
            drop(unsafe { Box::from_raw(current) });
        }
    }
}

impl<K, V> fmt::Debug for SyncMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SyncMap")
            .field("len", &state.map.len())
            .field("operations", &state.operations)
            .field("snapshot", &!self.snapshot.load(Ordering::Relaxed).is_null())
            .finish()
    }
}
