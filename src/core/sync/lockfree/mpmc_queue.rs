/*!
 * MPMC Bounded Lock-Free Queue
 * Fixed ring of generation-tagged slots (power-of-two capacity)
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::aligned::CacheAligned;
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One ring cell
///
/// `age` says which logical position may touch the cell next:
/// - `age == pos`: free for the enqueue at `pos`
/// - `age == pos + 1`: holds the value enqueued at `pos`, ready for dequeue
/// - after dequeue, `age = pos + capacity` frees it for the next lap
struct Slot<T> {
    age: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Bounded multi-producer multi-consumer queue
///
/// # Performance
///
/// - No allocation after construction
/// - One CAS per successful operation; no locks, no parking
/// - Head and tail on separate cache lines
///
/// Full and empty are reported immediately, never waited on.
pub struct BoundedQueue<T> {
    head: CacheAligned<AtomicUsize>,
    tail: CacheAligned<AtomicUsize>,
    slots: Box<[Slot<T>]>,
    mask: usize,
}

// Safety: a slot's value is touched only by the thread that won its position
unsafe impl<T: Send> Send for BoundedQueue<T> {}
unsafe impl<T: Send> Sync for BoundedQueue<T> {}

impl<T> BoundedQueue<T> {
    /// Create a queue holding up to `capacity` values
    ///
    /// `capacity` must be a power of two of at least 2. With a single slot
    /// "full at `pos`" (`age == pos + 1`) and "free for the next lap"
    /// (`age == pos + capacity`) would be the same value.
    pub fn new(capacity: usize) -> SyncResult<Self> {
        if capacity < 2 || !capacity.is_power_of_two() {
            return Err(SyncError::InvalidCapacity(capacity));
        }

        let slots = (0..capacity)
            .map(|i| Slot {
                age: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();

        Ok(Self {
            head: CacheAligned::new(AtomicUsize::new(0)),
            tail: CacheAligned::new(AtomicUsize::new(0)),
            slots,
            mask: capacity - 1,
        })
    }

    /// Enqueue, handing the value back if the queue is full
    pub fn enqueue(&self, value: T) -> Result<(), T> {
        let mut pos = self.tail.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos & self.mask];
            let age = slot.age.load(Ordering::Acquire);
            let diff = age.wrapping_sub(pos) as isize;

            if diff == 0 {
                match self.tail.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: winning the CAS grants exclusive use of this
                        // slot until `age` is published below.
                        unsafe { (*slot.value.get()).write(value) };
                        slot.age.store(pos.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(actual) => pos = actual,
                }
            } else if diff < 0 {
                // Slot still holds the value from one lap ago
                return Err(value);
            } else {
                pos = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    /// Dequeue the oldest value, or `None` if empty
    pub fn dequeue(&self) -> Option<T> {
        let mut pos = self.head.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos & self.mask];
            let age = slot.age.load(Ordering::Acquire);
            let diff = age.wrapping_sub(pos.wrapping_add(1)) as isize;

            if diff == 0 {
                match self.head.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: the Acquire load of `age` saw the producer's
                        // publish, and winning the CAS makes this read unique.
                        let value = unsafe { (*slot.value.get()).assume_init_read() };
                        slot.age
                            .store(pos.wrapping_add(self.capacity()), Ordering::Release);
                        return Some(value);
                    }
                    Err(actual) => pos = actual,
                }
            } else if diff < 0 {
                // Nothing enqueued at this position yet
                return None;
            } else {
                pos = self.head.load(Ordering::Relaxed);
            }
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Approximate number of queued values
    ///
    /// May be stale by the time it returns under concurrent use.
    pub fn len(&self) -> usize {
        loop {
            let tail = self.tail.load(Ordering::SeqCst);
            let head = self.head.load(Ordering::SeqCst);
            // Re-check tail so the pair is a consistent snapshot
            if self.tail.load(Ordering::SeqCst) == tail {
                return tail.wrapping_sub(head).min(self.capacity());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }
}

impl<T> Drop for BoundedQueue<T> {
    fn drop(&mut self) {
        while self.dequeue().is_some() {}
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
