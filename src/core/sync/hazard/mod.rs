/*!
 * Hazard-Pointer Reclamation
 *
 * Safe memory reclamation for lock-free structures within one process:
 * - Readers publish the pointer they are about to dereference in a hazard slot
 * - Writers retire unlinked pointers instead of freeing them
 * - A scan frees only the retired pointers no slot references
 *
 * # Architecture
 *
 * A [`Domain`] owns the registry of per-thread hazard records, a lock-free
 * retirement list and a try-lock that keeps scans single-threaded without
 * ever blocking a retiring thread. Threads register explicitly through
 * [`Domain::register`], or implicitly per thread via [`Domain::with_local`].
 *
 * # Guarantees
 *
 * A deleter runs only after every hazard slot was observed not to hold its
 * pointer. Nothing stronger: this is not an epoch or RCU scheme, and a
 * retired pointer that stays protected stays on the list indefinitely.
 */

mod domain;
mod participant;
mod record;
mod retired;

pub use domain::{Domain, ScanOutcome, SmrStats};
pub use participant::{HazardGuard, Participant};
