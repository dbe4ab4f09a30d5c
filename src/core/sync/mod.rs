/*!
 * Synchronization Primitives
 *
 * Lock-free and blocking primitives that share one memory-reclamation story:
 * - Hazard-pointer domain for deferred frees under concurrent readers
 * - Lock-free MPSC stack and MPMC bounded queue
 * - SyncMap: lock-free snapshot reads, mutex-guarded writes
 * - Futex mutex (the only primitive that parks a thread)
 * - Reader/writer spinlock
 *
 * # Waiting
 *
 * Apart from `FutexMutex::lock`, every wait here is a busy spin or a CAS
 * retry loop. They consume CPU rather than yield, and none of them support
 * timeouts or cancellation.
 */

mod aligned;
pub mod config;
pub mod futex;
pub mod hazard;
pub mod locks;
pub mod lockfree;
mod spinwait;

pub use aligned::CacheAligned;
pub use config::{SmrConfig, SyncMapConfig};
pub use futex::{futex_wait, futex_wake_all, futex_wake_one, WakeResult};
pub use hazard::{Domain, HazardGuard, Participant, ScanOutcome, SmrStats};
pub use lockfree::{mpsc_stack, BoundedQueue, MpscStack, StackConsumer, StackProducer, SyncMap};
pub use locks::{
    FutexMutex, FutexMutexGuard, RawFutexMutex, RawRwSpinLock, RwSpinLock, RwSpinReadGuard,
    RwSpinWriteGuard,
};
pub use spinwait::SpinWait;
