//! Filesystem service configuration.
//!
//! The block size is a compile-time constant: every cached descriptor holds
//! exactly one page and every read/write request must move exactly one page.
//! Capacities are runtime settings read from the boot configuration blob.

use serde::{Deserialize, Serialize};

use crate::error::FssError;

/// Size of one cached data block (one cache page)
pub const FSS_CACHE_DB_SIZE: usize = 4096;

/// Longest name a readdir record can carry (name length is a `u8`)
pub const FSS_NAME_MAX: usize = 255;

/// Largest readdir buffer accepted over IPC
pub const FSS_READDIR_MAX: usize = 16 * FSS_CACHE_DB_SIZE;

/// Default number of descriptors the block cache may hold
pub const DEFAULT_MAX_DESCRIPTORS: usize = 1024;

/// Default number of open capabilities
pub const DEFAULT_MAX_HANDLES: usize = 256;

/// Default first request id of the filesystem service
pub const DEFAULT_SERVICE_ID_BASE: u32 = 0x100;

/// Runtime configuration for the filesystem service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FssConfig {
    /// Maximum number of block descriptors alive at once
    pub max_descriptors: usize,
    /// Maximum number of open capabilities in the reference handle table
    pub max_handles: usize,
    /// First request id assigned to the service by the dispatch framework
    pub service_id_base: u32,
}

impl Default for FssConfig {
    fn default() -> Self {
        Self {
            max_descriptors: DEFAULT_MAX_DESCRIPTORS,
            max_handles: DEFAULT_MAX_HANDLES,
            service_id_base: DEFAULT_SERVICE_ID_BASE,
        }
    }
}

impl FssConfig {
    /// Parse a JSON boot configuration. Missing fields take their defaults.
    pub fn from_json(bytes: &[u8]) -> Result<Self, FssError> {
        let config: FssConfig =
            serde_json::from_slice(bytes).map_err(|_| FssError::BadArgument)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<(), FssError> {
        if self.max_descriptors == 0 || self.max_handles == 0 {
            return Err(FssError::BadArgument);
        }
        Ok(())
    }
}
