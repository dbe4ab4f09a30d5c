/*!
 * Limits and Constants
 *
 * Centralized location for thresholds and magic numbers used by the
 * synchronization primitives.
 *
 * - Performance-critical constants are marked with [PERF]
 */

// =============================================================================
// HAZARD POINTER RECLAMATION
// =============================================================================

/// Retirements between automatic scans of the free list (100)
/// A scan fires once the approximate pending count exceeds this value
/// [PERF] Amortizes the O(threads * slots) hazard snapshot across retirements
pub const DEFAULT_SCAN_THRESHOLD: usize = 100;

/// Hazard slots owned by each registered thread (4)
/// Slot 0 is the primary slot used by acquire/release; the rest back
/// scoped guards so one thread can protect several pointers at once
pub const DEFAULT_HAZARD_SLOTS: usize = 4;

/// Lower bound on hazard slots per thread (2)
/// Guards never use the primary slot, so lock-free readers need one more
pub const MIN_HAZARD_SLOTS: usize = 2;

/// Upper bound on hazard slots per thread (64)
/// Guard slots are tracked in a single u64 bitmask
pub const MAX_HAZARD_SLOTS: usize = 64;

// =============================================================================
// SYNC MAP
// =============================================================================

/// Locked operations between snapshot refreshes (100)
/// Bounds how long lock-free readers stay on the slow path after a write
pub const DEFAULT_SNAPSHOT_REFRESH_INTERVAL: usize = 100;

// =============================================================================
// SPINNING
// =============================================================================

/// Exponent cap for spin backoff (2^6 = 64 pause hints per step)
/// [PERF] Keeps a contended spinner from hammering the cache line
pub const SPIN_BACKOFF_LIMIT: u32 = 6;

