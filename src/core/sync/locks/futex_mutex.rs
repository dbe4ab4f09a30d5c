/*!
 * Futex Mutex
 * Three-state blocking mutex on a single atomic word
 */

use crate::core::sync::futex::{futex_wait, futex_wake_one};
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, Ordering};

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
const CONTENDED: u32 = 2;

/// Raw futex mutex without associated data
///
/// Word states:
/// - `0`: unlocked
/// - `1`: locked, no waiters
/// - `2`: locked, waiters may be sleeping
///
/// # Performance
///
/// - **Uncontended lock/unlock**: one CAS and one `fetch_sub`, no syscall
/// - **Contended**: lockers sleep in the kernel; unlock wakes exactly one
///
/// `lock` is the only call in this crate that truly blocks the thread.
pub struct RawFutexMutex {
    state: AtomicU32,
}

impl RawFutexMutex {
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(UNLOCKED),
        }
    }

    /// Acquire the lock, sleeping while another thread holds it
    #[inline]
    pub fn lock(&self) {
        if self
            .state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            self.lock_contended();
        }
    }

    #[cold]
    fn lock_contended(&self) {
        // Announce a waiter before sleeping so unlock knows to wake someone.
        // A thread that wins the swap on 0 owns the lock in state 2, which
        // costs at most one unnecessary wake later.
        while self.state.swap(CONTENDED, Ordering::Acquire) != UNLOCKED {
            futex_wait(&self.state, CONTENDED);
        }
    }

    /// Try to acquire without blocking
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Release the lock
    ///
    /// # Safety
    ///
    /// The calling context must hold the lock.
    #[inline]
    pub unsafe fn unlock(&self) {
        if self.state.fetch_sub(1, Ordering::Release) != LOCKED {
            self.state.store(UNLOCKED, Ordering::Release);
            futex_wake_one(&self.state);
        }
    }

    /// Check whether the lock is currently held (racy, diagnostic only)
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != UNLOCKED
    }
}

impl Default for RawFutexMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RawFutexMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFutexMutex")
            .field("state", &self.state.load(Ordering::Relaxed))
            .finish()
    }
}

/// Futex mutex protecting a value
///
/// # Example
///
/// ```
/// use hazard_sync::FutexMutex;
///
/// let counter = FutexMutex::new(0u64);
/// *counter.lock() += 1;
/// assert_eq!(*counter.lock(), 1);
/// ```
pub struct FutexMutex<T: ?Sized> {
    raw: RawFutexMutex,
    data: UnsafeCell<T>,
}

// Safety: access to `data` is serialized by `raw`
unsafe impl<T: ?Sized + Send> Send for FutexMutex<T> {}
unsafe impl<T: ?Sized + Send> Sync for FutexMutex<T> {}

impl<T> FutexMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            raw: RawFutexMutex::new(),
            data: UnsafeCell::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> FutexMutex<T> {
    /// Lock, blocking until available
    #[inline]
    pub fn lock(&self) -> FutexMutexGuard<'_, T> {
        self.raw.lock();
        FutexMutexGuard { mutex: self }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<FutexMutexGuard<'_, T>> {
        if self.raw.try_lock() {
            Some(FutexMutexGuard { mutex: self })
        } else {
            None
        }
    }

    /// Mutable access without locking; `&mut self` proves exclusivity
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }
}

impl<T: Default> Default for FutexMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for FutexMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => f.debug_struct("FutexMutex").field("data", &&*guard).finish(),
            None => f.debug_struct("FutexMutex").field("data", &"<locked>").finish(),
        }
    }
}

/// RAII guard; unlocks on drop
#[must_use = "if unused the mutex will immediately unlock"]
pub struct FutexMutexGuard<'a, T: ?Sized> {
    mutex: &'a FutexMutex<T>,
}

// Safety: sharing the guard only shares `&T`
unsafe impl<T: ?Sized + Sync> Sync for FutexMutexGuard<'_, T> {}

impl<T: ?Sized> Deref for FutexMutexGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for FutexMutexGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for FutexMutexGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: the guard exists only while the lock is held.
        unsafe { self.mutex.raw.unlock() }
    }
}
