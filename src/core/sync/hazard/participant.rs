/*!
 * Participants and Guards
 *
 * A `Participant` is a thread's registration with a domain: it owns one
 * hazard record for as long as it lives. It is deliberately `!Send`, since
 * hazard slots have a single writer.
 */

use super::domain::{Domain, DomainInner};
use super::record::HazardRecord;
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

const PRIMARY_SLOT: usize = 0;

/// A thread's registration with a [`Domain`]
///
/// Obtained from [`Domain::register`]. Dropping it clears every slot and
/// returns the record to the domain for reuse by a later registration.
pub struct Participant {
    domain: Arc<DomainInner>,
    record: NonNull<HazardRecord>,
    /// Bitmask of secondary slots currently held by guards
    claimed: Cell<u64>,
    _not_send: PhantomData<*mut ()>,
}

impl Participant {
    pub(super) fn new(domain: Arc<DomainInner>, record: NonNull<HazardRecord>) -> Self {
        Self {
            domain,
            record,
            claimed: Cell::new(0),
            _not_send: PhantomData,
        }
    }

    #[inline(always)]
    fn record(&self) -> &HazardRecord {
        // SAFETY: records outlive the domain's RecordList, which `self.domain` keeps alive.
        unsafe { self.record.as_ref() }
    }

    /// Publish `src`'s current value in `slot` until a re-read agrees
    ///
    /// Once this returns, any scan that starts afterwards observes the
    /// hazard, so the returned pointer cannot be reclaimed until the slot
    /// is cleared. The loop retries only while `src` keeps changing.
    #[inline]
    fn publish<T>(&self, slot: &AtomicPtr<()>, src: &AtomicPtr<T>) -> *mut T {
        let mut value = src.load(Ordering::Acquire);
        loop {
            slot.store(value.cast(), Ordering::SeqCst);
            let fresh = src.load(Ordering::SeqCst);
            if fresh == value {
                return value;
            }
            value = fresh;
        }
    }

    /// Protect the value currently held by `src` using the primary slot
    ///
    /// Replaces whatever the primary slot protected before. The pointer stays
    /// protected until [`release`](Self::release), the next `acquire`, or
    /// the participant is dropped.
    pub fn acquire<T>(&self, src: &AtomicPtr<T>) -> *mut T {
        self.publish(self.record().slot(PRIMARY_SLOT), src)
    }

    /// Clear the primary slot
    pub fn release(&self) {
        self.record()
            .slot(PRIMARY_SLOT)
            .store(ptr::null_mut(), Ordering::Release);
    }

    /// Protect `src`'s value in a secondary slot for the guard's lifetime
    ///
    /// Returns `None` if every secondary slot is already held by a live
    /// guard; callers fall back to a non-lock-free path in that case.
    pub fn protect<T>(&self, src: &AtomicPtr<T>) -> Option<HazardGuard<'_, T>> {
        let index = self.claim_slot()?;
        let ptr = self.publish(self.record().slot(index), src);
        Some(HazardGuard {
            participant: self,
            index,
            ptr,
        })
    }

    fn claim_slot(&self) -> Option<usize> {
        let claimed = self.claimed.get();
        let index = (1..self.record().slot_count()).find(|i| claimed & (1u64 << i) == 0)?;
        self.claimed.set(claimed | (1u64 << index));
        Some(index)
    }

    fn release_slot(&self, index: usize) {
        self.record()
            .slot(index)
            .store(ptr::null_mut(), Ordering::Release);
        self.claimed.set(self.claimed.get() & !(1u64 << index));
    }

    /// Whether any of this participant's slots currently holds `ptr`
    pub fn is_protecting<T>(&self, ptr: *mut T) -> bool {
        let record = self.record();
        (0..record.slot_count())
            .any(|i| record.slot(i).load(Ordering::Relaxed) == ptr.cast::<()>())
    }

    /// Number of hazard slots (primary plus secondary)
    pub fn slot_count(&self) -> usize {
        self.record().slot_count()
    }

    /// Handle to the domain this participant is registered with
    pub fn domain(&self) -> Domain {
        Domain::from_inner(self.domain.clone())
    }

    pub(super) fn domain_id(&self) -> u64 {
        self.domain.id
    }

    /// True once every `Domain` handle is gone, whatever other participants remain
    pub(super) fn is_orphaned(&self) -> bool {
        self.domain.handles.load(Ordering::Acquire) == 0
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        self.record().release();
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("domain", &self.domain.id)
            .field("slots", &self.slot_count())
            .field("claimed", &format_args!("{:#b}", self.claimed.get()))
            .finish()
    }
}

/// Scoped hazard protection; clears its slot on drop
#[must_use = "protection ends as soon as the guard is dropped"]
pub struct HazardGuard<'a, T> {
    participant: &'a Participant,
    index: usize,
    ptr: *mut T,
}

impl<T> HazardGuard<'_, T> {
    /// The protected pointer (may be null if the source was null)
    #[inline]
    pub fn as_ptr(&self) -> *mut T {
        self.ptr
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// Borrow the protected value
    ///
    /// # Safety
    ///
    /// Every pointer ever stored in the source must be either null or valid
    /// until retired through the same domain as this guard's participant.
    #[inline]
    pub unsafe fn as_ref(&self) -> Option<&T> {
        self.ptr.as_ref()
    }
}

impl<T> Drop for HazardGuard<'_, T> {
    fn drop(&mut self) {
        self.participant.release_slot(self.index);
    }
}

impl<T> fmt::Debug for HazardGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HazardGuard")
            .field("slot", &self.index)
            .field("ptr", &self.ptr)
            .finish()
    }
}
