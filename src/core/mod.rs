/*!
 * Core Module
 * Error handling, limits, tracing setup and the synchronization primitives
 */

pub mod errors;
pub mod limits;
pub mod sync;
pub mod tracer;

// Re-export for convenience
pub use errors::*;
