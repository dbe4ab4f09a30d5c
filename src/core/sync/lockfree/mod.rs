/*!
 * Lock-Free Synchronization Primitives
 *
 * Non-blocking data structures:
 * - MPSC stack (any producers, one consumer)
 * - MPMC bounded queue (generation-tagged ring)
 * - SyncMap (hazard-protected snapshots for read-mostly workloads)
 */

pub mod mpsc_stack;
mod mpmc_queue;
mod sync_map;

// Re-export public API
pub use mpmc_queue::BoundedQueue;
pub use mpsc_stack::{MpscStack, StackConsumer, StackProducer};
pub use sync_map::SyncMap;
