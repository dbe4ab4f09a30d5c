/*!
 * Lock-Based Synchronization Primitives
 *
 * Mutual exclusion built directly on atomics:
 * - Futex mutex (blocks in the kernel under contention)
 * - Reader/writer spinlock (busy-spins, never parks)
 */

mod futex_mutex;
mod rw_spin;

// Re-export public API
pub use futex_mutex::{FutexMutex, FutexMutexGuard, RawFutexMutex};
pub use rw_spin::{RawRwSpinLock, RwSpinLock, RwSpinReadGuard, RwSpinWriteGuard};
