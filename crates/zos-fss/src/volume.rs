//! Mounted volumes.

use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;

use crate::driver::FsDriver;
use crate::node::{FileNode, NodeIds};
use crate::types::{DriverHandle, NodeId};

/// A mounted instance of a filesystem driver.
///
/// The volume owns its root node; nodes point back at the volume weakly.
pub struct Volume {
    /// Volume id (the driver's name)
    id: String,
    /// Driver serving this volume
    driver: Arc<dyn FsDriver>,
    /// Root of the node tree
    root: Arc<FileNode>,
    /// Id source shared with the other volumes of the registry
    node_ids: Arc<NodeIds>,
}

impl Volume {
    /// Build a volume around a successful mount.
    ///
    /// The root node takes ownership of `mount_handle`.
    pub(crate) fn new(
        id: String,
        driver: Arc<dyn FsDriver>,
        mount_handle: DriverHandle,
        node_ids: Arc<NodeIds>,
    ) -> Arc<Self> {
        let root_id = node_ids.next();
        Arc::new_cyclic(|volume| Volume {
            id,
            driver,
            root: FileNode::new_root(root_id, volume.clone(), mount_handle),
            node_ids,
        })
    }

    /// Fresh id for a node of this volume.
    pub(crate) fn next_node_id(&self) -> NodeId {
        self.node_ids.next()
    }

    /// Volume id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Driver serving this volume.
    pub fn driver(&self) -> &Arc<dyn FsDriver> {
        &self.driver
    }

    /// Root directory.
    pub fn root(&self) -> &Arc<FileNode> {
        &self.root
    }
}

impl fmt::Debug for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Volume")
            .field("id", &self.id)
            .field("driver", &self.driver.name())
            .finish()
    }
}
