//! Capability handle table.
//!
//! The syscall layer exchanges integer handles for node references. The
//! service never touches a node without translating a handle first and
//! balances every `translate` with a `put`.
//!
//! A borrowed node holds a tree reference until its `put`, so deleting the
//! handle meanwhile cannot release the driver handle under the borrower.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;

use spin::Mutex;
use tracing::warn;

use crate::error::{FssError, FssResult};
use crate::node::FileNode;
use crate::types::Handle;

/// Handle table consumed by the request handlers.
pub trait HandleTable: Send + Sync {
    /// Allocate a handle for `node`. The table keeps the node reference.
    fn create(&self, node: Arc<FileNode>) -> FssResult<Handle>;

    /// Borrow the node behind `handle`. The borrow holds a node reference.
    fn translate(&self, handle: Handle) -> Option<Arc<FileNode>>;

    /// Return a borrow obtained from `translate`, dropping its reference.
    fn put(&self, handle: Handle, node: Arc<FileNode>);

    /// Remove `handle`, returning the node it referenced.
    fn delete(&self, handle: Handle) -> Option<Arc<FileNode>>;
}

struct CapEntry {
    node: Arc<FileNode>,
    borrows: usize,
}

struct CapSlots {
    slots: BTreeMap<u32, CapEntry>,
    next_slot: u32,
}

/// Slot-map handle table with a fixed capacity.
pub struct CapabilityTable {
    max_handles: usize,
    inner: Mutex<CapSlots>,
}

impl CapabilityTable {
    pub fn new(max_handles: usize) -> Self {
        Self {
            max_handles,
            inner: Mutex::new(CapSlots {
                slots: BTreeMap::new(),
                next_slot: 0,
            }),
        }
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Outstanding `translate` borrows on `handle`.
    pub fn borrows(&self, handle: Handle) -> Option<usize> {
        self.inner.lock().slots.get(&handle.0).map(|e| e.borrows)
    }
}

impl HandleTable for CapabilityTable {
    fn create(&self, node: Arc<FileNode>) -> FssResult<Handle> {
        let mut inner = self.inner.lock();
        if inner.slots.len() >= self.max_handles {
            return Err(FssError::OutOfMemory);
        }
        let mut slot = inner.next_slot;
        while inner.slots.contains_key(&slot) {
            slot = slot.wrapping_add(1);
        }
        inner.next_slot = slot.wrapping_add(1);
        inner.slots.insert(slot, CapEntry { node, borrows: 0 });
        Ok(Handle(slot))
    }

    fn translate(&self, handle: Handle) -> Option<Arc<FileNode>> {
        let mut inner = self.inner.lock();
        let entry = inner.slots.get_mut(&handle.0)?;
        entry.borrows += 1;
        entry.node.acquire();
        Some(entry.node.clone())
    }

    fn put(&self, handle: Handle, node: Arc<FileNode>) {
        {
            let mut inner = self.inner.lock();
            match inner.slots.get_mut(&handle.0) {
                Some(entry) if Arc::ptr_eq(&entry.node, &node) && entry.borrows > 0 => {
                    entry.borrows -= 1;
                }
                // Deleted while borrowed.
                None => {}
                Some(_) => warn!(handle = handle.0, "unbalanced handle put"),
            }
        }
        // Outside the table lock: the last reference closes the driver handle.
        node.release();
    }

    fn delete(&self, handle: Handle) -> Option<Arc<FileNode>> {
        self.inner.lock().slots.remove(&handle.0).map(|e| e.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::testing::sample_driver;

    fn root() -> (Registry, Arc<FileNode>) {
        let registry = Registry::new();
        let root = registry
            .register_driver(sample_driver("mem"))
            .unwrap()
            .root()
            .clone();
        (registry, root)
    }

    #[test]
    fn test_create_translate_delete() {
        let (_registry, root) = root();
        let table = CapabilityTable::new(4);

        let handle = table.create(root.clone()).unwrap();
        let node = table.translate(handle).unwrap();
        assert!(Arc::ptr_eq(&node, &root));
        assert_eq!(table.borrows(handle), Some(1));
        assert_eq!(root.ref_count(), 2);
        table.put(handle, node);
        assert_eq!(table.borrows(handle), Some(0));
        assert_eq!(root.ref_count(), 1);

        assert!(Arc::ptr_eq(&table.delete(handle).unwrap(), &root));
        assert!(table.translate(handle).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_delete_while_borrowed_keeps_node_open() {
        let (_registry, root) = root();
        let data = crate::tree::open(&root, "data").unwrap();
        let table = CapabilityTable::new(4);

        let handle = table.create(data.clone()).unwrap();
        let borrowed = table.translate(handle).unwrap();
        let owned = table.delete(handle).unwrap();
        crate::tree::close(&owned);
        assert!(borrowed.is_open());
        assert_eq!(borrowed.ref_count(), 1);

        table.put(handle, borrowed);
        assert_eq!(data.ref_count(), 0);
        assert!(!data.is_open());
    }

    #[test]
    fn test_capacity_and_slot_reuse() {
        let (_registry, root) = root();
        let table = CapabilityTable::new(2);

        let a = table.create(root.clone()).unwrap();
        let b = table.create(root.clone()).unwrap();
        assert_ne!(a, b);
        assert_eq!(table.create(root.clone()).unwrap_err(), FssError::OutOfMemory);

        table.delete(a);
        let c = table.create(root.clone()).unwrap();
        assert_ne!(c, b);
        assert_eq!(table.len(), 2);
    }
}
