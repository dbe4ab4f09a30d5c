/*!
 * Hazard Records
 *
 * One record per registered thread, holding a fixed array of hazard slots.
 * Records live in an append-only lock-free list owned by the domain and are
 * recycled through their `active` flag instead of being freed, so a scanner
 * can walk the list without synchronizing with registration.
 */

use ahash::AHashSet;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};

/// Per-thread hazard slots
///
/// Slots are written only by the owning participant and read by scanners.
pub(crate) struct HazardRecord {
    slots: Box<[AtomicPtr<()>]>,
    active: AtomicBool,
    next: AtomicPtr<HazardRecord>,
}

impl HazardRecord {
    fn new(slot_count: usize) -> Self {
        Self {
            slots: (0..slot_count)
                .map(|_| AtomicPtr::new(ptr::null_mut()))
                .collect(),
            active: AtomicBool::new(true),
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }

    #[inline(always)]
    pub(crate) fn slot(&self, index: usize) -> &AtomicPtr<()> {
        &self.slots[index]
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Clear every slot and hand the record back for reuse
    pub(crate) fn release(&self) {
        for slot in self.slots.iter() {
            slot.store(ptr::null_mut(), Ordering::Release);
        }
        self.active.store(false, Ordering::Release);
    }

    fn try_claim(&self) -> bool {
        !self.active.load(Ordering::Relaxed)
            && self
                .active
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
    }
}

/// Append-only list of hazard records
pub(crate) struct RecordList {
    head: AtomicPtr<HazardRecord>,
    len: AtomicUsize,
}

/// How a record was obtained
pub(crate) enum Claim {
    Reused(*const HazardRecord),
    Fresh(*const HazardRecord),
}

impl RecordList {
    pub(crate) const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            len: AtomicUsize::new(0),
        }
    }

    /// Claim an inactive record, or append a new one with `slot_count` slots
    pub(crate) fn claim(&self, slot_count: usize) -> Claim {
        for record in self.iter() {
            if record.try_claim() {
                return Claim::Reused(record);
            }
        }

        let record = Box::into_raw(Box::new(HazardRecord::new(slot_count)));
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            // SAFETY: `record` is not yet shared.
            unsafe { (*record).next.store(head, Ordering::Relaxed) };
            match self
                .head
                .compare_exchange_weak(head, record, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }
        self.len.fetch_add(1, Ordering::Relaxed);
        Claim::Fresh(record)
    }

    /// Every non-null pointer currently published in any slot
    pub(crate) fn protected_addresses(&self) -> AHashSet<usize> {
        let mut hazards = AHashSet::new();
        for record in self.iter() {
            for slot in record.slots.iter() {
                let value = slot.load(Ordering::SeqCst);
                if !value.is_null() {
                    hazards.insert(value as usize);
                }
            }
        }
        hazards
    }

    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub(crate) fn active(&self) -> usize {
        self.iter()
            .filter(|record| record.active.load(Ordering::Relaxed))
            .count()
    }

    fn iter(&self) -> RecordIter<'_> {
        RecordIter {
            current: self.head.load(Ordering::Acquire),
            _list: self,
        }
    }
}

impl Drop for RecordList {
    fn drop(&mut self) {
        let mut current = *self.head.get_mut();
        while !current.is_null() {
            // SAFETY: records are only freed here, with exclusive access.
            let record = unsafe { Box::from_raw(current) };
            current = record.next.load(Ordering::Relaxed);
        }
    }
}

struct RecordIter<'a> {
    current: *mut HazardRecord,
    _list: &'a RecordList,
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = &'a HazardRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_null() {
            return None;
        }
        // SAFETY: records are never freed while the list is borrowed.
        let record = unsafe { &*self.current };
        self.current = record.next.load(Ordering::Acquire);
        Some(record)
    }
}
