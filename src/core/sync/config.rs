/*!
 * Synchronization Configuration
 *
 * Runtime configuration for the reclamation domain and the sync map
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::{
    DEFAULT_HAZARD_SLOTS, DEFAULT_SCAN_THRESHOLD, DEFAULT_SNAPSHOT_REFRESH_INTERVAL,
    MAX_HAZARD_SLOTS, MIN_HAZARD_SLOTS,
};
use serde::{Deserialize, Serialize};

/// Hazard pointer domain configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmrConfig {
    /// Pending retirements that trigger an automatic scan
    pub scan_threshold: usize,
    /// Hazard slots per registered thread (slot 0 is the primary slot, the
    /// rest back guards; at least 2)
    pub slots_per_thread: usize,
}

impl Default for SmrConfig {
    fn default() -> Self {
        Self {
            scan_threshold: DEFAULT_SCAN_THRESHOLD,
            slots_per_thread: DEFAULT_HAZARD_SLOTS,
        }
    }
}

impl SmrConfig {
    /// Scan on every retirement
    ///
    /// Useful in tests that want deterministic reclamation points.
    pub const fn eager() -> Self {
        Self {
            scan_threshold: 0,
            slots_per_thread: DEFAULT_HAZARD_SLOTS,
        }
    }

    /// Reject configurations the domain cannot honor
    pub fn validate(&self) -> SyncResult<()> {
        if self.slots_per_thread < MIN_HAZARD_SLOTS {
            return Err(SyncError::InvalidConfig(format!(
                "slots_per_thread must be at least {}, got {}",
                MIN_HAZARD_SLOTS, self.slots_per_thread
            )));
        }
        if self.slots_per_thread > MAX_HAZARD_SLOTS {
            return Err(SyncError::InvalidConfig(format!(
                "slots_per_thread must be at most {}, got {}",
                MAX_HAZARD_SLOTS, self.slots_per_thread
            )));
        }
        Ok(())
    }
}

/// Sync map configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncMapConfig {
    /// Locked operations between snapshot republishes
    pub refresh_interval: usize,
}

impl Default for SyncMapConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_SNAPSHOT_REFRESH_INTERVAL,
        }
    }
}

impl SyncMapConfig {
    /// Republish after every locked operation
    pub const fn eager() -> Self {
        Self {
            refresh_interval: 1,
        }
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.refresh_interval == 0 {
            return Err(SyncError::InvalidConfig(
                "refresh_interval must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
