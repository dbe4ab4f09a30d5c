/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 *
 * Contention is never an error in this crate: full and empty structures are
 * reported through `Result<(), T>` / `Option<T>`. The variants below cover
 * only precondition violations that a constructor can detect up front.
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Construction and configuration errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SyncError {
    #[error("Invalid queue capacity: {0}")]
    #[diagnostic(
        code(sync::invalid_capacity),
        help("Bounded queue capacity must be a power of two of at least 2 (2, 4, 8, ...).")
    )]
    InvalidCapacity(usize),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(sync::invalid_config),
        help("Review configuration parameters. Each thread needs at least 2 hazard slots and refresh intervals must be non-zero.")
    )]
    InvalidConfig(String),
}

impl SyncError {
    /// Stable snake_case identifier, matching the serde tag
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::InvalidCapacity(_) => "invalid_capacity",
            SyncError::InvalidConfig(_) => "invalid_config",
        }
    }
}

/// Result alias used throughout the crate
pub type SyncResult<T> = Result<T, SyncError>;
