/*!
 * Reclamation Domain
 *
 * Owns the hazard record registry, the retirement list and the scan lock.
 * Every structure that defers frees through hazard pointers shares one
 * domain with the threads that read it.
 */

use super::participant::Participant;
use super::record::{Claim, RecordList};
use super::retired::{RetiredList, RetiredNode};
use crate::core::errors::SyncResult;
use crate::core::sync::config::SmrConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::ptr::NonNull;
use std::rc::Rc;
use std::sync::atomic::{fence, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

static NEXT_DOMAIN_ID: AtomicU64 = AtomicU64::new(1);

static GLOBAL: OnceLock<Domain> = OnceLock::new();

thread_local! {
    static LOCAL_PARTICIPANTS: RefCell<Vec<Rc<Participant>>> = const { RefCell::new(Vec::new()) };
}

/// Outcome of a single scan attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Another thread held the scan lock; nothing was touched
    Skipped,
    /// The list was processed
    Completed {
        /// Deleters run by this scan
        reclaimed: usize,
        /// Nodes pushed back because a hazard slot still referenced them
        deferred: usize,
    },
}

impl ScanOutcome {
    pub fn reclaimed(&self) -> usize {
        match self {
            ScanOutcome::Completed { reclaimed, .. } => *reclaimed,
            ScanOutcome::Skipped => 0,
        }
    }
}

/// Point-in-time counters for a domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmrStats {
    pub retired: u64,
    pub reclaimed: u64,
    pub deferred: u64,
    pub scans: u64,
    pub scans_skipped: u64,
    /// Hazard records ever allocated (records are reused, never freed early)
    pub records: usize,
    /// Records currently owned by a participant
    pub active_records: usize,
}

#[derive(Default)]
struct AtomicStats {
    retired: AtomicU64,
    reclaimed: AtomicU64,
    deferred: AtomicU64,
    scans: AtomicU64,
    scans_skipped: AtomicU64,
}

pub(crate) struct DomainInner {
    pub(crate) id: u64,
    /// Live `Domain` handles; participants are not counted
    pub(crate) handles: AtomicUsize,
    config: SmrConfig,
    records: RecordList,
    retired: RetiredList,
    /// Approximate number of nodes on the retired list
    pending: AtomicUsize,
    scan_lock: Mutex<()>,
    stats: AtomicStats,
}

/// Hazard-pointer reclamation domain
///
/// Cloning yields another handle to the same domain. Independent domains
/// share nothing, so tests can run isolated instances side by side.
///
/// # Example
///
/// ```
/// use hazard_sync::Domain;
/// use std::sync::atomic::AtomicPtr;
///
/// let domain = Domain::new();
/// let shared = AtomicPtr::new(Box::into_raw(Box::new(42u32)));
///
/// let me = domain.register();
/// let p = me.acquire(&shared);
/// assert_eq!(unsafe { *p }, 42);
/// me.release();
///
/// let old = shared.swap(std::ptr::null_mut(), std::sync::atomic::Ordering::SeqCst);
/// unsafe { domain.retire_box(old) };
/// domain.scan();
/// ```
pub struct Domain {
    inner: Arc<DomainInner>,
}

impl Domain {
    /// Create a domain with the default configuration
    pub fn new() -> Self {
        Self::build(SmrConfig::default())
    }

    /// Create a domain with a validated configuration
    pub fn with_config(config: SmrConfig) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SmrConfig) -> Self {
        let id = NEXT_DOMAIN_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            domain = id,
            scan_threshold = config.scan_threshold,
            slots_per_thread = config.slots_per_thread,
            "Created reclamation domain"
        );
        Self {
            inner: Arc::new(DomainInner {
                id,
                handles: AtomicUsize::new(1),
                config,
                records: RecordList::new(),
                retired: RetiredList::new(),
                pending: AtomicUsize::new(0),
                scan_lock: Mutex::new(()),
                stats: AtomicStats::default(),
            }),
        }
    }

    pub(super) fn from_inner(inner: Arc<DomainInner>) -> Self {
        inner.handles.fetch_add(1, Ordering::Relaxed);
        Self { inner }
    }

    /// Process-wide default domain, created on first use
    pub fn global() -> &'static Domain {
        GLOBAL.get_or_init(Domain::new)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &SmrConfig {
        &self.inner.config
    }

    /// Register the calling thread, claiming a free hazard record
    pub fn register(&self) -> Participant {
        let slots = self.inner.config.slots_per_thread;
        let record = match self.inner.records.claim(slots) {
            Claim::Reused(record) => {
                trace!(domain = self.inner.id, "Reused hazard record");
                record
            }
            Claim::Fresh(record) => {
                debug!(
                    domain = self.inner.id,
                    records = self.inner.records.len(),
                    "Allocated hazard record"
                );
                record
            }
        };
        // SAFETY: claim never returns null.
        let record = unsafe { NonNull::new_unchecked(record as *mut _) };
        Participant::new(self.inner.clone(), record)
    }

    /// Run `f` with this thread's cached participant for this domain
    ///
    /// Registers lazily on first use per thread. The registration is dropped
    /// (and its record recycled) when the thread exits.
    pub fn with_local<R>(&self, f: impl FnOnce(&Participant) -> R) -> R {
        let cached = LOCAL_PARTICIPANTS.try_with(|cell| {
            let mut cache = cell.borrow_mut();
            if let Some(found) = cache.iter().find(|p| p.domain_id() == self.inner.id) {
                return (found.clone(), Vec::new());
            }

            // Registrations whose domain has no handles left; dropped outside
            // the borrow since that may run the domain's pending deleters
            let mut orphans = Vec::new();
            cache.retain(|p| {
                if p.is_orphaned() {
                    orphans.push(p.clone());
                    false
                } else {
                    true
                }
            });

            let participant = Rc::new(self.register());
            cache.push(participant.clone());
            (participant, orphans)
        });

        match cached {
            Ok((participant, orphans)) => {
                drop(orphans);
                f(&participant)
            }
            // Thread-local storage is being torn down
            Err(_) => f(&self.register()),
        }
    }

    /// Defer `deleter(ptr)` until no hazard slot references `ptr`
    ///
    /// Triggers a scan once the approximate pending count passes the
    /// configured threshold. Never blocks: if another thread is scanning,
    /// the node simply waits for a later scan.
    ///
    /// # Safety
    ///
    /// - `ptr` must already be unreachable for new readers (removed from
    ///   every shared location that participants acquire from)
    /// - `ptr` must not be retired twice
    /// - `deleter` must be sound to call on any thread
    pub unsafe fn retire<T, F>(&self, ptr: *mut T, deleter: F)
    where
        T: 'static,
        F: FnOnce(*mut T) + Send + 'static,
    {
        let addr = ptr as usize;
        self.inner
            .retired
            .push(RetiredNode::new(addr, Box::new(move || deleter(addr as *mut T))));
        self.inner.stats.retired.fetch_add(1, Ordering::Relaxed);

        let pending = self.inner.pending.fetch_add(1, Ordering::Relaxed) + 1;
        if pending > self.inner.config.scan_threshold {
            self.scan();
        }
    }

    /// Retire a pointer obtained from `Box::into_raw`
    ///
    /// # Safety
    ///
    /// Same contract as [`retire`](Self::retire); `ptr` must come from
    /// `Box::into_raw`.
    pub unsafe fn retire_box<T: Send + 'static>(&self, ptr: *mut T) {
        self.retire(ptr, |p| drop(Box::from_raw(p)));
    }

    /// Reclaim every retired node no hazard slot protects
    ///
    /// At most one thread scans at a time; a caller that loses the try-lock
    /// returns [`ScanOutcome::Skipped`] immediately.
    pub fn scan(&self) -> ScanOutcome {
        let inner = &*self.inner;
        inner.pending.store(0, Ordering::Relaxed);

        let Some(_scan_guard) = inner.scan_lock.try_lock() else {
            inner.stats.scans_skipped.fetch_add(1, Ordering::Relaxed);
            trace!(domain = inner.id, "Scan already in progress, skipping");
            return ScanOutcome::Skipped;
        };
        inner.stats.scans.fetch_add(1, Ordering::Relaxed);

        let detached = inner.retired.take_all();

        // Pairs with the SeqCst publish in Participant::acquire: a reader
        // whose re-read still saw the pointer has a slot we will observe.
        fence(Ordering::SeqCst);
        let hazards = inner.records.protected_addresses();

        let mut reclaimed = 0;
        let mut deferred = 0;
        for mut node in detached {
            if hazards.contains(&node.addr) {
                inner.retired.push(node);
                deferred += 1;
            } else if node.reclaim() {
                reclaimed += 1;
            }
        }

        inner.pending.fetch_add(deferred, Ordering::Relaxed);
        inner
            .stats
            .reclaimed
            .fetch_add(reclaimed as u64, Ordering::Relaxed);
        inner
            .stats
            .deferred
            .fetch_add(deferred as u64, Ordering::Relaxed);

        if reclaimed > 0 || deferred > 0 {
            debug!(
                domain = inner.id,
                reclaimed,
                deferred,
                hazards = hazards.len(),
                "Scanned retired list"
            );
        }

        ScanOutcome::Completed {
            reclaimed,
            deferred,
        }
    }

    /// Approximate number of retired nodes awaiting a scan
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> SmrStats {
        let stats = &self.inner.stats;
        SmrStats {
            retired: stats.retired.load(Ordering::Relaxed),
            reclaimed: stats.reclaimed.load(Ordering::Relaxed),
            deferred: stats.deferred.load(Ordering::Relaxed),
            scans: stats.scans.load(Ordering::Relaxed),
            scans_skipped: stats.scans_skipped.load(Ordering::Relaxed),
            records: self.inner.records.len(),
            active_records: self.inner.records.active(),
        }
    }

    /// Whether two handles refer to the same domain
    pub fn same_domain(&self, other: &Domain) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Clone for Domain {
    fn clone(&self) -> Self {
        self.inner.handles.fetch_add(1, Ordering::Relaxed);
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Drop for Domain {
    fn drop(&mut self) {
        if self.inner.handles.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        // Cached participants on other threads can keep the inner alive
        // until they are pruned; free what they do not protect now
        let outcome = self.scan();
        trace!(
            domain = self.inner.id,
            reclaimed = outcome.reclaimed(),
            "Last domain handle dropped"
        );
    }
}

impl Default for Domain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .field("pending", &self.pending())
            .finish()
    }
}

impl Drop for DomainInner {
    fn drop(&mut self) {
        // No participant can exist here (each holds an Arc), so every
        // remaining node is unprotected; RetiredList's drop reclaims them.
        trace!(domain = self.id, "Dropping reclamation domain");
    }
}
