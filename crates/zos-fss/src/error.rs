//! Error types for the filesystem service.
//!
//! Every request handler reports failure as an [`FssError`]; the dispatch
//! layer turns it into a negative status code with [`FssError::errno`].

use core::fmt;
use serde::{Deserialize, Serialize};

/// Errors from filesystem service operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FssError {
    /// Name resolution failed
    NotFound,

    /// Capability resolved but the node has no usable driver handle
    BadFileDescriptor,

    /// Descriptor, node or capability allocation exhausted
    OutOfMemory,

    /// Malformed request (wrong size, zero capacity, unknown op code)
    BadArgument,

    /// Directory operation on a regular file
    NotADirectory,

    /// Driver read/write/mount/enumerate failure
    IoError,

    /// Operation not implemented
    NotSupported,
}

impl FssError {
    /// Negative status code returned to the dispatch framework.
    pub const fn errno(self) -> i64 {
        match self {
            FssError::NotFound => -2,
            FssError::IoError => -5,
            FssError::BadFileDescriptor => -9,
            FssError::OutOfMemory => -12,
            FssError::NotADirectory => -20,
            FssError::BadArgument => -22,
            FssError::NotSupported => -38,
        }
    }

    /// Map a negative status code back to an error.
    pub fn from_errno(code: i64) -> Option<Self> {
        match code {
            -2 => Some(FssError::NotFound),
            -5 => Some(FssError::IoError),
            -9 => Some(FssError::BadFileDescriptor),
            -12 => Some(FssError::OutOfMemory),
            -20 => Some(FssError::NotADirectory),
            -22 => Some(FssError::BadArgument),
            -38 => Some(FssError::NotSupported),
            _ => None,
        }
    }
}

impl fmt::Display for FssError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FssError::NotFound => "no such file or directory",
            FssError::BadFileDescriptor => "bad file descriptor",
            FssError::OutOfMemory => "out of memory",
            FssError::BadArgument => "invalid argument",
            FssError::NotADirectory => "not a directory",
            FssError::IoError => "i/o error",
            FssError::NotSupported => "operation not supported",
        };
        f.write_str(msg)
    }
}

/// Errors reported by a filesystem driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverError {
    /// Entry does not exist on the medium
    NotFound,

    /// Medium read/write failed
    Io,

    /// Medium is full
    NoSpace,

    /// Driver does not implement the operation
    Unsupported,
}

impl From<DriverError> for FssError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::NotFound => FssError::NotFound,
            DriverError::Io => FssError::IoError,
            DriverError::NoSpace => FssError::IoError,
            DriverError::Unsupported => FssError::NotSupported,
        }
    }
}

/// Result alias used across the service.
pub type FssResult<T> = Result<T, FssError>;
