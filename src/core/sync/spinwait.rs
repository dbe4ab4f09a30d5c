/*!
 * Spin Backoff
 *
 * Exponential busy-wait used by the CAS retry loops and the RW spinlock.
 * Never yields to the scheduler: a spinning thread burns its core until the
 * condition it waits on changes.
 */

use crate::core::limits::SPIN_BACKOFF_LIMIT;
use std::hint::spin_loop;

/// Exponential spin backoff
///
/// # Performance
///
/// - Step `n` issues `2^min(n, limit)` pause hints
/// - No syscalls, no parking, no allocation
/// - Higher CPU usage during wait; callers must not hold it for long
#[derive(Debug, Default)]
pub struct SpinWait {
    step: u32,
}

impl SpinWait {
    #[inline]
    pub const fn new() -> Self {
        Self { step: 0 }
    }

    /// Back off once, doubling the spin length up to the cap
    #[inline]
    pub fn spin(&mut self) {
        for _ in 0..1u32 << self.step.min(SPIN_BACKOFF_LIMIT) {
            spin_loop();
        }
        if self.step <= SPIN_BACKOFF_LIMIT {
            self.step += 1;
        }
    }

    /// Spin until `done` returns true
    #[inline]
    pub fn spin_until(&mut self, mut done: impl FnMut() -> bool) {
        while !done() {
            self.spin();
        }
    }
}
