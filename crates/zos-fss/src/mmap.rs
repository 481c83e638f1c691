//! Memory-mapping collaborator.

use crate::node::FileNode;
use crate::types::Protection;

/// Maps file contents into an address space.
pub trait MemoryMapper: Send + Sync {
    /// Map `size` bytes of `node` with `protection`; returns the base
    /// address, or `None` if no mapping could be established.
    fn map_file(&self, node: &FileNode, size: u64, protection: Protection) -> Option<u64>;
}
