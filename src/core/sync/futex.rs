/*!
 * Futex Wait/Wake
 *
 * Uses parking_lot_core for futex-like operations on all platforms.
 * On Linux, this maps directly to futex syscalls for minimal overhead.
 *
 * # Design
 *
 * The parking key is the address of the atomic word itself. The value check
 * runs inside parking_lot_core's validate callback, which holds the bucket
 * lock that `unpark_*` also takes. A wake issued after the waiter's check
 * therefore cannot slip past it: check-and-sleep is atomic, exactly like
 * `FUTEX_WAIT`.
 */

use parking_lot_core::{park, unpark_all, unpark_one, ParkResult, ParkToken, UnparkToken};
use std::sync::atomic::{AtomicU32, Ordering};

/// Result of a wake operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeResult {
    /// Successfully woke N waiters (N >= 1)
    Woken(usize),
    /// No waiters were waiting
    NoWaiters,
}

impl WakeResult {
    /// Get number of woken waiters (0 if none)
    #[inline(always)]
    pub fn count(&self) -> usize {
        match self {
            WakeResult::Woken(n) => *n,
            WakeResult::NoWaiters => 0,
        }
    }
}

#[inline(always)]
fn key_of(word: &AtomicU32) -> usize {
    word as *const AtomicU32 as usize
}

/// Sleep on `word` while it holds `expected`
///
/// Returns `true` if the thread actually slept and was woken, `false` if the
/// word no longer held `expected` at the time of the check. Spurious returns
/// are possible; callers re-check their condition in a loop.
pub fn futex_wait(word: &AtomicU32, expected: u32) -> bool {
    // SAFETY: the key is the address of a live atomic and none of the
    // callbacks call back into parking_lot or panic.
    let result = unsafe {
        park(
            key_of(word),
            || word.load(Ordering::Relaxed) == expected,
            || {},
            |_key, _was_last| {},
            ParkToken(0),
            None,
        )
    };

    matches!(result, ParkResult::Unparked(_))
}

/// Wake one thread sleeping on `word`
pub fn futex_wake_one(word: &AtomicU32) -> WakeResult {
    // SAFETY: the callback does not touch parking_lot state.
    let result = unsafe { unpark_one(key_of(word), |_| UnparkToken(0)) };

    match result.unparked_threads {
        0 => WakeResult::NoWaiters,
        n => WakeResult::Woken(n),
    }
}

/// Wake every thread sleeping on `word`
pub fn futex_wake_all(word: &AtomicU32) -> WakeResult {
    // SAFETY: see futex_wake_one.
    let unparked = unsafe { unpark_all(key_of(word), UnparkToken(0)) };

    match unparked {
        0 => WakeResult::NoWaiters,
        n => WakeResult::Woken(n),
    }
}
