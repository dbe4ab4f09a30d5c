/*!
 * Reader/Writer Spinlock
 * Single-word RW lock that never parks
 */

use crate::core::sync::spinwait::SpinWait;
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

const WRITER: usize = 1;
const READER: usize = 2;

/// Raw reader/writer spinlock
///
/// The word holds `readers * 2`, or `1` while a writer owns it. Readers and
/// writers both busy-spin; nothing here yields to the scheduler.
///
/// No fairness: a steady stream of readers can starve a writer forever,
/// since the writer only succeeds when the word is exactly `0`.
pub struct RawRwSpinLock {
    state: AtomicUsize,
}

impl RawRwSpinLock {
    pub const fn new() -> Self {
        Self {
            state: AtomicUsize::new(0),
        }
    }

    /// Acquire shared access
    #[inline]
    pub fn lock_read(&self) {
        let mut backoff = SpinWait::new();
        let mut current = self.state.load(Ordering::Relaxed);
        loop {
            if current & WRITER != 0 {
                backoff.spin();
                current = self.state.load(Ordering::Relaxed);
                continue;
            }
            match self.state.compare_exchange_weak(
                current,
                current + READER,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    #[inline]
    pub fn try_lock_read(&self) -> bool {
        let current = self.state.load(Ordering::Relaxed);
        current & WRITER == 0
            && self
                .state
                .compare_exchange(current, current + READER, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
    }

    /// Release shared access
    ///
    /// # Safety
    ///
    /// The caller must hold a read lock.
    #[inline]
    pub unsafe fn unlock_read(&self) {
        self.state.fetch_sub(READER, Ordering::Release);
    }

    /// Acquire exclusive access; spins until there are no readers or writer
    #[inline]
    pub fn lock_write(&self) {
        let mut backoff = SpinWait::new();
        while self
            .state
            .compare_exchange_weak(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // Test before retrying the CAS so waiters spin on a shared line
            backoff.spin_until(|| self.state.load(Ordering::Relaxed) == 0);
        }
    }

    #[inline]
    pub fn try_lock_write(&self) -> bool {
        self.state
            .compare_exchange(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Release exclusive access
    ///
    /// # Safety
    ///
    /// The caller must hold the write lock.
    #[inline]
    pub unsafe fn unlock_write(&self) {
        self.state.store(0, Ordering::Release);
    }

    /// Current number of readers (racy, diagnostic only)
    pub fn reader_count(&self) -> usize {
        let state = self.state.load(Ordering::Relaxed);
        if state & WRITER != 0 {
            0
        } else {
            state / READER
        }
    }

    pub fn is_write_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) & WRITER != 0
    }
}

impl Default for RawRwSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RawRwSpinLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRwSpinLock")
            .field("readers", &self.reader_count())
            .field("writer", &self.is_write_locked())
            .finish()
    }
}

/// Reader/writer spinlock protecting a value
///
/// # When to Use
///
/// Critical sections that are a handful of instructions long and read-mostly.
/// For anything that can block or run long, use `FutexMutex`.
pub struct RwSpinLock<T: ?Sized> {
    raw: RawRwSpinLock,
    data: UnsafeCell<T>,
}

// Safety: readers share `&T` (needs Sync), writers move through `&mut T` (needs Send)
unsafe impl<T: ?Sized + Send> Send for RwSpinLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for RwSpinLock<T> {}

impl<T> RwSpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            raw: RawRwSpinLock::new(),
            data: UnsafeCell::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> RwSpinLock<T> {
    #[inline]
    pub fn read(&self) -> RwSpinReadGuard<'_, T> {
        self.raw.lock_read();
        RwSpinReadGuard { lock: self }
    }

    #[inline]
    pub fn write(&self) -> RwSpinWriteGuard<'_, T> {
        self.raw.lock_write();
        RwSpinWriteGuard { lock: self }
    }

    pub fn try_read(&self) -> Option<RwSpinReadGuard<'_, T>> {
        self.raw
            .try_lock_read()
            .then(|| RwSpinReadGuard { lock: self })
    }

    pub fn try_write(&self) -> Option<RwSpinWriteGuard<'_, T>> {
        self.raw
            .try_lock_write()
            .then(|| RwSpinWriteGuard { lock: self })
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Access to the underlying raw lock for diagnostics
    pub fn raw(&self) -> &RawRwSpinLock {
        &self.raw
    }
}

impl<T: Default> Default for RwSpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for RwSpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_read() {
            Some(guard) => f.debug_struct("RwSpinLock").field("data", &&*guard).finish(),
            None => f.debug_struct("RwSpinLock").field("data", &"<locked>").finish(),
        }
    }
}

#[must_use = "if unused the lock will immediately unlock"]
pub struct RwSpinReadGuard<'a, T: ?Sized> {
    lock: &'a RwSpinLock<T>,
}

impl<T: ?Sized> Deref for RwSpinReadGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for RwSpinReadGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        unsafe { self.lock.raw.unlock_read() }
    }
}

#[must_use = "if unused the lock will immediately unlock"]
pub struct RwSpinWriteGuard<'a, T: ?Sized> {
    lock: &'a RwSpinLock<T>,
}

impl<T: ?Sized> Deref for RwSpinWriteGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for RwSpinWriteGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for RwSpinWriteGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        unsafe { self.lock.raw.unlock_write() }
    }
}
