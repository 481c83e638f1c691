//! Filesystem driver interface.
//!
//! A driver backs exactly one volume. The service only ever talks to it
//! through [`DriverHandle`]s it handed out itself, and treats every error as
//! final: nothing here is retried.

use alloc::vec::Vec;

use crate::error::DriverError;
use crate::types::{DriverEntry, DriverHandle};

/// Operation set of a pluggable filesystem driver.
///
/// Calls may block on the medium but must be bounded, and a driver must not
/// call back into the block cache for the descriptor it is serving: the
/// descriptor lock is held across `read` and `write`.
pub trait FsDriver: Send + Sync {
    /// Driver name. Doubles as the id of the volume it mounts.
    fn name(&self) -> &str;

    /// Mount the medium. `root` of `None` mounts the default root.
    fn mount(&self, root: Option<&str>) -> Result<DriverHandle, DriverError>;

    /// Open `name` inside the directory behind `parent`.
    fn open(&self, parent: DriverHandle, name: &str) -> Result<DriverHandle, DriverError>;

    /// Fill `buf` with block `block`; returns the number of valid bytes.
    fn read(&self, handle: DriverHandle, block: u64, buf: &mut [u8]) -> Result<usize, DriverError>;

    /// Write `buf` as block `block`; returns the number of bytes written.
    fn write(&self, handle: DriverHandle, block: u64, buf: &[u8]) -> Result<usize, DriverError>;

    /// Release a handle returned by `mount` or `open`.
    fn close(&self, handle: DriverHandle);

    /// List a directory in the driver's own order.
    fn enumerate(&self, dir: DriverHandle) -> Result<Vec<DriverEntry>, DriverError>;

    /// Current size in bytes of the file behind `handle`.
    fn size(&self, handle: DriverHandle) -> Result<u64, DriverError>;
}
