//! In-memory file nodes.
//!
//! Nodes form a tree: a directory owns its children, children point back at
//! their parent and at their volume through `Weak` links. A node learns its
//! driver handle lazily, the first time it is opened.
//!
//! # Reference counting
//!
//! `refs` counts lookups and opens. The closer that takes it to zero
//! re-checks the count under the handle lock before releasing the driver
//! handle, so an opener racing with the last close either keeps the handle
//! alive or opens a fresh one; it never sees a released handle.
//!
//! # Directory population
//!
//! ```text
//!   INCOMPLETE ──claim (CAS)──▶ POPULATING ──enumerate ok──▶ COMPLETE
//!        ▲                           │
//!        └──────── enumerate failed ─┘
//! ```
//!
//! A materialized directory keeps one reference of its own so its driver
//! handle stays open for children to be opened against.
//!
//! Lock order is always child before parent.

use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};

use spin::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::driver::FsDriver;
use crate::error::{FssError, FssResult};
use crate::notify::Subscription;
use crate::types::{DriverHandle, NodeId, NodeType};
use crate::volume::Volume;

const TREE_INCOMPLETE: u8 = 0;
const TREE_POPULATING: u8 = 1;
const TREE_COMPLETE: u8 = 2;

/// Node id source shared by every volume of one registry.
pub(crate) struct NodeIds(AtomicU64);

impl NodeIds {
    pub(crate) fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub(crate) fn next(&self) -> NodeId {
        NodeId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// A file or directory in the in-memory tree.
pub struct FileNode {
    id: NodeId,
    name: String,
    kind: NodeType,
    volume: Weak<Volume>,
    parent: Weak<FileNode>,
    /// Lookup/open references
    refs: AtomicUsize,
    /// Driver-private handle, `None` until first opened
    private: Mutex<Option<DriverHandle>>,
    /// Directory completion state
    tree: AtomicU8,
    /// Children in driver-reported order
    children: RwLock<Vec<Arc<FileNode>>>,
    /// Registered notification subscriptions
    pub(crate) subscriptions: Mutex<Vec<Subscription>>,
}

impl FileNode {
    fn new(
        id: NodeId,
        name: String,
        kind: NodeType,
        volume: Weak<Volume>,
        parent: Weak<FileNode>,
        private: Option<DriverHandle>,
        refs: usize,
    ) -> Arc<Self> {
        Arc::new(FileNode {
            id,
            name,
            kind,
            volume,
            parent,
            refs: AtomicUsize::new(refs),
            private: Mutex::new(private),
            tree: AtomicU8::new(TREE_INCOMPLETE),
            children: RwLock::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    /// Root directory of a freshly mounted volume. The mount holds one reference.
    pub(crate) fn new_root(
        id: NodeId,
        volume: Weak<Volume>,
        mount_handle: DriverHandle,
    ) -> Arc<Self> {
        Self::new(
            id,
            String::from("/"),
            NodeType::Directory,
            volume,
            Weak::new(),
            Some(mount_handle),
            1,
        )
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeType {
        self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.kind == NodeType::Directory
    }

    /// Parent directory, `None` for a volume root.
    pub fn parent(&self) -> Option<Arc<FileNode>> {
        self.parent.upgrade()
    }

    /// Owning volume, `None` once the volume is gone.
    pub fn volume(&self) -> Option<Arc<Volume>> {
        self.volume.upgrade()
    }

    /// Current reference count.
    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    /// Driver handle, if the node is open.
    pub fn handle(&self) -> Option<DriverHandle> {
        *self.private.lock()
    }

    /// True if the node holds a driver handle.
    pub fn is_open(&self) -> bool {
        self.handle().is_some()
    }

    /// True once the directory's children have been populated.
    pub fn is_complete(&self) -> bool {
        self.tree.load(Ordering::Acquire) == TREE_COMPLETE
    }

    /// Snapshot of the children in their stable order.
    pub fn children(&self) -> Vec<Arc<FileNode>> {
        self.children.read().clone()
    }

    /// Find a materialized child by name.
    pub fn find_child(&self, name: &str) -> Option<Arc<FileNode>> {
        self.children
            .read()
            .iter()
            .find(|child| child.name == name)
            .cloned()
    }

    /// Absolute path inside the volume, for diagnostics.
    pub fn path(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut current = self.parent();
        if current.is_some() {
            parts.push(self.name.clone());
        }
        while let Some(node) = current {
            current = node.parent();
            if current.is_some() {
                parts.push(node.name.clone());
            }
        }
        let mut path = String::new();
        for part in parts.iter().rev() {
            path.push('/');
            path.push_str(part);
        }
        if path.is_empty() {
            path.push('/');
        }
        path
    }

    /// Driver serving this node's volume.
    pub fn driver(&self) -> FssResult<Arc<dyn FsDriver>> {
        self.volume()
            .map(|volume| volume.driver().clone())
            .ok_or(FssError::BadFileDescriptor)
    }

    /// Current file size as reported by the driver; 0 when unknown.
    pub fn file_size(&self) -> u64 {
        let Some(handle) = self.handle() else {
            return 0;
        };
        match self.driver() {
            Ok(driver) => driver.size(handle).unwrap_or(0),
            Err(_) => 0,
        }
    }

    // ========================================================================
    // Reference counting and driver handles
    // ========================================================================

    /// Take a reference.
    pub(crate) fn acquire(&self) {
        self.refs.fetch_add(1, Ordering::AcqRel);
    }

    /// Make sure the node holds a driver handle. The caller holds a reference.
    pub(crate) fn ensure_handle(&self) -> FssResult<DriverHandle> {
        let mut private = self.private.lock();
        if let Some(handle) = *private {
            return Ok(handle);
        }

        let parent = self.parent().ok_or(FssError::BadFileDescriptor)?;
        let parent_handle = parent.handle().ok_or(FssError::BadFileDescriptor)?;
        let driver = self.driver()?;

        let handle = driver.open(parent_handle, &self.name).map_err(|e| {
            warn!(node = %self.path(), error = ?e, "driver open failed");
            FssError::from(e)
        })?;
        *private = Some(handle);
        Ok(handle)
    }

    /// Drop a reference; the last one releases the driver handle.
    pub(crate) fn release(&self) {
        let prev = self
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match prev {
            Ok(1) => {}
            Ok(_) => return,
            Err(_) => {
                warn!(node = %self.path(), "release on a node with no references");
                return;
            }
        }

        let mut private = self.private.lock();
        // A concurrent lookup may have revived the node since the decrement.
        if self.refs.load(Ordering::Acquire) != 0 {
            return;
        }
        if let Some(handle) = private.take() {
            match self.driver() {
                Ok(driver) => driver.close(handle),
                Err(_) => warn!(node = %self.path(), "volume gone, driver handle leaked"),
            }
        }
    }

    // ========================================================================
    // Directory population
    // ========================================================================

    /// Populate the children from the driver, once.
    ///
    /// Concurrent callers converge: one enumerates, the others wait for the
    /// result. If the enumeration fails the claim is dropped and a waiter
    /// may try again.
    pub fn materialize(self: &Arc<Self>) -> FssResult<()> {
        if !self.is_directory() {
            return Err(FssError::NotADirectory);
        }

        loop {
            match self.tree.compare_exchange(
                TREE_INCOMPLETE,
                TREE_POPULATING,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(TREE_COMPLETE) => return Ok(()),
                Err(_) => core::hint::spin_loop(),
            }
        }

        match self.populate() {
            Ok(count) => {
                self.tree.store(TREE_COMPLETE, Ordering::Release);
                debug!(dir = %self.path(), entries = count, "directory materialized");
                Ok(())
            }
            Err(e) => {
                self.tree.store(TREE_INCOMPLETE, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Runs only while holding the POPULATING claim.
    fn populate(self: &Arc<Self>) -> FssResult<usize> {
        let volume = self.volume().ok_or(FssError::BadFileDescriptor)?;

        // The tree's own reference keeps the directory handle open.
        self.acquire();
        let handle = match self.ensure_handle() {
            Ok(handle) => handle,
            Err(e) => {
                self.release();
                return Err(e);
            }
        };

        let entries = match self.driver().and_then(|driver| {
            driver.enumerate(handle).map_err(|e| {
                warn!(dir = %self.path(), error = ?e, "directory enumeration failed");
                FssError::IoError
            })
        }) {
            Ok(entries) => entries,
            Err(e) => {
                self.release();
                return Err(e);
            }
        };

        let mut children = self.children.write();
        children.reserve(entries.len());
        for entry in entries {
            children.push(FileNode::new(
                volume.next_node_id(),
                entry.name,
                entry.kind,
                self.volume.clone(),
                Arc::downgrade(self),
                None,
                0,
            ));
        }
        Ok(children.len())
    }
}

impl fmt::Debug for FileNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("refs", &self.ref_count())
            .finish()
    }
}
