//! Block cache.
//!
//! Caches file data one page at a time. Each (node, block index) pair has at
//! most one [`BlockDescriptor`]; descriptors are created under the cache map
//! lock so concurrent first accesses converge on the same one.
//!
//! # Descriptor states
//!
//! ```text
//!                 driver read ok
//!   (empty) ──────────────────────▶ VALID
//!                                    │ write
//!                                    ▼
//!                               VALID | DIRTY ──write_back ok──▶ VALID
//! ```
//!
//! The descriptor lock guards flags and buffer and is held across driver
//! calls. Lock order is cache map before descriptor.
//!
//! A DIRTY descriptor holds a reference on its node, so the driver handle
//! stays open after the last close until the block is written back.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Mutex;
use tracing::{debug, warn};

use crate::config::{FssConfig, FSS_CACHE_DB_SIZE};
use crate::error::{FssError, FssResult};
use crate::node::FileNode;
use crate::notify::NotifyHub;
use crate::types::{FileEvent, NodeId};

/// Descriptor flag set
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DbdFlags(u8);

impl DbdFlags {
    /// Buffer holds data fetched from the driver
    pub const VALID: DbdFlags = DbdFlags(0x01);
    /// Buffer was modified and not yet written back
    pub const DIRTY: DbdFlags = DbdFlags(0x02);

    pub fn contains(self, other: DbdFlags) -> bool {
        self.0 & other.0 == other.0
    }

    fn insert(&mut self, other: DbdFlags) {
        self.0 |= other.0;
    }

    fn remove(&mut self, other: DbdFlags) {
        self.0 &= !other.0;
    }
}

struct BlockData {
    buffer: Vec<u8>,
    valid_size: usize,
    flags: DbdFlags,
}

/// Cached copy of one block of a node's data.
pub struct BlockDescriptor {
    node: Arc<FileNode>,
    block: u64,
    refs: AtomicUsize,
    data: Mutex<BlockData>,
}

impl BlockDescriptor {
    /// New descriptor holding one reference.
    fn new(node: Arc<FileNode>, block: u64) -> FssResult<Self> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(FSS_CACHE_DB_SIZE)
            .map_err(|_| FssError::OutOfMemory)?;
        buffer.resize(FSS_CACHE_DB_SIZE, 0);
        Ok(Self {
            node,
            block,
            refs: AtomicUsize::new(1),
            data: Mutex::new(BlockData {
                buffer,
                valid_size: 0,
                flags: DbdFlags::default(),
            }),
        })
    }

    pub fn node(&self) -> &Arc<FileNode> {
        &self.node
    }

    pub fn block(&self) -> u64 {
        self.block
    }

    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    pub fn flags(&self) -> DbdFlags {
        self.data.lock().flags
    }

    pub fn is_valid(&self) -> bool {
        self.flags().contains(DbdFlags::VALID)
    }

    pub fn is_dirty(&self) -> bool {
        self.flags().contains(DbdFlags::DIRTY)
    }

    pub fn valid_size(&self) -> usize {
        self.data.lock().valid_size
    }
}

impl fmt::Debug for BlockDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockDescriptor")
            .field("node", &self.node.id())
            .field("block", &self.block)
            .field("refs", &self.ref_count())
            .finish()
    }
}

/// Direction and caller buffer of a block transfer.
pub enum BlockIo<'a> {
    /// Copy the cached block into the buffer
    Read(&'a mut [u8]),
    /// Copy the buffer into the cached block and mark it dirty
    Write(&'a [u8]),
}

/// Drops the descriptor reference when it goes out of scope.
struct Pinned<'a> {
    cache: &'a BlockCache,
    desc: Arc<BlockDescriptor>,
}

impl Drop for Pinned<'_> {
    fn drop(&mut self) {
        self.cache.unpin(&self.desc);
    }
}

type BlockKey = (NodeId, u64);

/// Page-granular cache of file data.
pub struct BlockCache {
    max_descriptors: usize,
    descriptors: Mutex<BTreeMap<BlockKey, Arc<BlockDescriptor>>>,
    notify: Arc<NotifyHub>,
}

impl BlockCache {
    pub fn new(config: &FssConfig, notify: Arc<NotifyHub>) -> Self {
        Self {
            max_descriptors: config.max_descriptors,
            descriptors: Mutex::new(BTreeMap::new()),
            notify,
        }
    }

    /// Number of live descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the descriptor for (`node`, `block`), creating it if absent.
    ///
    /// The returned reference must be handed back with [`BlockCache::put`].
    pub fn get(&self, node: &Arc<FileNode>, block: u64) -> FssResult<Arc<BlockDescriptor>> {
        let key = (node.id(), block);
        let mut descriptors = self.descriptors.lock();

        if let Some(desc) = descriptors.get(&key) {
            desc.refs.fetch_add(1, Ordering::AcqRel);
            return Ok(desc.clone());
        }

        if descriptors.len() >= self.max_descriptors {
            warn!(
                node = %node.path(),
                block,
                capacity = self.max_descriptors,
                "block cache full"
            );
            return Err(FssError::OutOfMemory);
        }

        let desc = Arc::new(BlockDescriptor::new(node.clone(), block)?);
        descriptors.insert(key, desc.clone());
        Ok(desc)
    }

    /// Hand back a reference obtained from [`BlockCache::get`].
    ///
    /// At zero references the descriptor becomes reclaimable.
    pub fn put(&self, desc: Arc<BlockDescriptor>) {
        self.unpin(&desc);
    }

    fn unpin(&self, desc: &BlockDescriptor) {
        if desc
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_err()
        {
            warn!(block = desc.block, "put on an unreferenced descriptor");
        }
    }

    /// Fetch the block from the driver unless it is already cached.
    ///
    /// Returns the number of valid bytes.
    pub fn ensure_valid(&self, desc: &BlockDescriptor) -> FssResult<usize> {
        let mut data = desc.data.lock();
        if data.flags.contains(DbdFlags::VALID) {
            return Ok(data.valid_size);
        }

        // Known to the tree but never opened by the driver.
        let handle = desc.node.handle().ok_or(FssError::BadFileDescriptor)?;
        let driver = desc.node.driver()?;

        debug!(node = %desc.node.path(), block = desc.block, "block cache miss");
        let size = driver
            .read(handle, desc.block, &mut data.buffer)
            .map_err(|e| {
                warn!(node = %desc.node.path(), block = desc.block, error = ?e, "block read failed");
                FssError::IoError
            })?;

        data.valid_size = size.min(FSS_CACHE_DB_SIZE);
        data.flags.insert(DbdFlags::VALID);
        Ok(data.valid_size)
    }

    /// Set DIRTY on a descriptor.
    pub fn mark_dirty(&self, desc: &BlockDescriptor) {
        Self::set_dirty(desc, &mut desc.data.lock());
    }

    /// The clean → DIRTY transition takes a node reference, keeping the
    /// driver handle open until the block is written back.
    fn set_dirty(desc: &BlockDescriptor, data: &mut BlockData) {
        if !data.flags.contains(DbdFlags::DIRTY) {
            desc.node.acquire();
            data.flags.insert(DbdFlags::DIRTY);
        }
    }

    /// Move one block between the cache and `io`'s buffer.
    ///
    /// Returns the number of valid bytes in the block afterwards and emits a
    /// read or write event on the node.
    pub fn block_io(&self, node: &Arc<FileNode>, block: u64, io: BlockIo<'_>) -> FssResult<usize> {
        let pinned = Pinned {
            cache: self,
            desc: self.get(node, block)?,
        };
        let desc = &pinned.desc;

        self.ensure_valid(desc)?;

        let (size, event) = {
            let mut data = desc.data.lock();
            match io {
                BlockIo::Read(buf) => {
                    let len = buf.len().min(FSS_CACHE_DB_SIZE);
                    buf[..len].copy_from_slice(&data.buffer[..len]);
                    (data.valid_size, FileEvent::Read)
                }
                BlockIo::Write(buf) => {
                    let len = buf.len().min(FSS_CACHE_DB_SIZE);
                    data.buffer[..len].copy_from_slice(&buf[..len]);
                    data.valid_size = data.valid_size.max(len);
                    Self::set_dirty(desc, &mut data);
                    (data.valid_size, FileEvent::Write)
                }
            }
        };

        drop(pinned);
        self.notify.emit(node, event);
        Ok(size)
    }

    /// Read one block into `buf`.
    pub fn read_block(&self, node: &Arc<FileNode>, block: u64, buf: &mut [u8]) -> FssResult<usize> {
        self.block_io(node, block, BlockIo::Read(buf))
    }

    /// Write one block from `buf`.
    pub fn write_block(&self, node: &Arc<FileNode>, block: u64, buf: &[u8]) -> FssResult<usize> {
        self.block_io(node, block, BlockIo::Write(buf))
    }

    // ========================================================================
    // Writeback and reclamation
    // ========================================================================

    /// Referenced snapshot of every DIRTY descriptor.
    ///
    /// Each returned descriptor must be handed back with [`BlockCache::put`].
    pub fn dirty_descriptors(&self) -> Vec<Arc<BlockDescriptor>> {
        let descriptors = self.descriptors.lock();
        descriptors
            .values()
            .filter(|desc| desc.data.lock().flags.contains(DbdFlags::DIRTY))
            .map(|desc| {
                desc.refs.fetch_add(1, Ordering::AcqRel);
                desc.clone()
            })
            .collect()
    }

    /// Write a dirty block to the driver. DIRTY is cleared only on success.
    ///
    /// Clearing DIRTY drops the node reference the dirty block held; if it
    /// was the last one the driver handle is closed.
    pub fn write_back(&self, desc: &BlockDescriptor) -> FssResult<()> {
        {
            let mut data = desc.data.lock();
            if !data.flags.contains(DbdFlags::DIRTY) {
                return Ok(());
            }

            let handle = desc.node.handle().ok_or(FssError::BadFileDescriptor)?;
            let driver = desc.node.driver()?;
            let valid = data.valid_size;
            driver
                .write(handle, desc.block, &data.buffer[..valid])
                .map_err(|e| {
                    warn!(node = %desc.node.path(), block = desc.block, error = ?e, "writeback failed");
                    FssError::IoError
                })?;

            data.flags.remove(DbdFlags::DIRTY);
        }
        desc.node.release();
        Ok(())
    }

    /// Drop every descriptor that is unreferenced and clean.
    ///
    /// Returns the number of descriptors dropped.
    pub fn reclaim(&self) -> usize {
        let mut descriptors = self.descriptors.lock();
        let before = descriptors.len();
        descriptors.retain(|_, desc| {
            desc.refs.load(Ordering::Acquire) != 0
                || desc.data.lock().flags.contains(DbdFlags::DIRTY)
        });
        let dropped = before - descriptors.len();
        if dropped > 0 {
            debug!(dropped, remaining = descriptors.len(), "reclaimed descriptors");
        }
        dropped
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;
