/*!
 * Hazard Sync Library
 * Lock-free and blocking synchronization primitives with hazard-pointer
 * memory reclamation
 */

pub mod core;

// Re-exports
pub use crate::core::errors::{SyncError, SyncResult};
pub use crate::core::sync::config::{SmrConfig, SyncMapConfig};
pub use crate::core::sync::hazard::{Domain, HazardGuard, Participant, ScanOutcome, SmrStats};
pub use crate::core::sync::lockfree::mpsc_stack;
pub use crate::core::sync::lockfree::{BoundedQueue, MpscStack, SyncMap};
pub use crate::core::sync::locks::{FutexMutex, FutexMutexGuard, RwSpinLock};
pub use crate::core::tracer::{init_test_tracing, init_tracing};
