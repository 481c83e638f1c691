//! Driver and volume registry.
//!
//! Registering a driver mounts it: the volume becomes visible to lookups
//! only after the mount probe succeeded, so a failed probe leaves nothing
//! behind. Drivers and volumes are never removed.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::{Mutex, RwLock};
use tracing::{info, warn};

use crate::driver::FsDriver;
use crate::error::{FssError, FssResult};
use crate::node::{FileNode, NodeIds};
use crate::volume::Volume;

/// Separator between a volume id and a path in a request name
pub const VOLUME_SEPARATOR: char = ':';

/// Registered drivers and mounted volumes.
pub struct Registry {
    drivers: Mutex<Vec<Arc<dyn FsDriver>>>,
    volumes: RwLock<Vec<Arc<Volume>>>,
    node_ids: Arc<NodeIds>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            drivers: Mutex::new(Vec::new()),
            volumes: RwLock::new(Vec::new()),
            node_ids: Arc::new(NodeIds::new()),
        }
    }

    /// Register a driver and mount its volume.
    ///
    /// A second driver with the same name is rejected. A failed mount
    /// keeps the driver registered but publishes no volume.
    pub fn register_driver(&self, driver: Arc<dyn FsDriver>) -> FssResult<Arc<Volume>> {
        let name = String::from(driver.name());
        info!(driver = %name, "registering filesystem");

        {
            let mut drivers = self.drivers.lock();
            if drivers.iter().any(|d| d.name() == name) {
                warn!(driver = %name, "driver already registered");
                return Err(FssError::BadArgument);
            }
            drivers.push(driver.clone());
        }

        let mount_handle = driver.mount(None).map_err(|e| {
            warn!(driver = %name, error = ?e, "mount probe failed");
            FssError::IoError
        })?;

        let volume = Volume::new(name, driver, mount_handle, self.node_ids.clone());
        self.volumes.write().push(volume.clone());

        info!(volume = volume.id(), "filesystem mounted");
        Ok(volume)
    }

    /// Find a mounted volume by id.
    pub fn find_volume(&self, id: &str) -> Option<Arc<Volume>> {
        self.volumes
            .read()
            .iter()
            .find(|volume| volume.id() == id)
            .cloned()
    }

    /// First mounted volume.
    pub fn default_volume(&self) -> Option<Arc<Volume>> {
        self.volumes.read().first().cloned()
    }

    /// All mounted volumes in mount order.
    pub fn volumes(&self) -> Vec<Arc<Volume>> {
        self.volumes.read().clone()
    }

    /// Names of all registered drivers, mounted or not.
    pub fn drivers(&self) -> Vec<String> {
        self.drivers
            .lock()
            .iter()
            .map(|d| String::from(d.name()))
            .collect()
    }

    /// Split a request name into the root it resolves from and the path.
    ///
    /// `volume:path` selects a volume by id; anything else resolves on the
    /// default volume.
    pub fn resolve<'a>(&self, name: &'a str) -> FssResult<(Arc<FileNode>, &'a str)> {
        let (volume, path) = match name.split_once(VOLUME_SEPARATOR) {
            Some((id, path)) => (self.find_volume(id), path),
            None => (self.default_volume(), name),
        };
        let volume = volume.ok_or(FssError::NotFound)?;
        Ok((volume.root().clone(), path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Fault, MemoryDriver};
    use crate::testing::sample_driver;

    #[test]
    fn test_two_volumes() {
        let registry = Registry::new();
        registry.register_driver(sample_driver("disk0")).unwrap();
        registry.register_driver(sample_driver("disk1")).unwrap();

        assert_eq!(registry.volumes().len(), 2);
        assert_eq!(registry.find_volume("disk1").unwrap().id(), "disk1");
        assert!(registry.find_volume("disk2").is_none());
        assert_eq!(registry.default_volume().unwrap().id(), "disk0");
    }

    #[test]
    fn test_failed_mount_publishes_nothing() {
        let registry = Registry::new();
        let driver = Arc::new(MemoryDriver::new("broken"));
        driver.set_fault(Fault::Mount, true);

        assert_eq!(
            registry.register_driver(driver.clone()).unwrap_err(),
            FssError::IoError
        );
        assert!(registry.find_volume("broken").is_none());
        assert!(registry.volumes().is_empty());
        assert_eq!(registry.drivers(), ["broken"]);
        assert_eq!(driver.calls().mount, 1);
    }

    #[test]
    fn test_duplicate_driver_rejected() {
        let registry = Registry::new();
        registry.register_driver(sample_driver("mem")).unwrap();
        assert_eq!(
            registry.register_driver(sample_driver("mem")).unwrap_err(),
            FssError::BadArgument
        );
        assert_eq!(registry.volumes().len(), 1);
    }

    #[test]
    fn test_resolve_names() {
        let registry = Registry::new();
        assert_eq!(registry.resolve("docs").unwrap_err(), FssError::NotFound);

        let first = registry.register_driver(sample_driver("a")).unwrap();
        let second = registry.register_driver(sample_driver("b")).unwrap();

        let (root, path) = registry.resolve("b:/docs/readme").unwrap();
        assert!(Arc::ptr_eq(&root, second.root()));
        assert_eq!(path, "/docs/readme");

        let (root, path) = registry.resolve("docs/readme").unwrap();
        assert!(Arc::ptr_eq(&root, first.root()));
        assert_eq!(path, "docs/readme");

        assert_eq!(registry.resolve("c:x").unwrap_err(), FssError::NotFound);
    }

    #[test]
    fn test_volume_root_holds_mount_handle() {
        let registry = Registry::new();
        let driver = sample_driver("mem");
        let volume = registry.register_driver(driver.clone()).unwrap();

        assert!(volume.root().is_open());
        assert_eq!(volume.root().ref_count(), 1);
        assert_eq!(volume.root().path(), "/");
        assert_eq!(driver.open_handles(), 1);
    }

    #[test]
    fn test_node_ids_unique_across_volumes() {
        let registry = Registry::new();
        let first = registry.register_driver(sample_driver("a")).unwrap();
        let second = registry.register_driver(sample_driver("b")).unwrap();
        first.root().materialize().unwrap();
        second.root().materialize().unwrap();

        let mut ids: Vec<_> = [first.root(), second.root()]
            .into_iter()
            .flat_map(|root| {
                let mut nodes = root.children();
                nodes.push(root.clone());
                nodes
            })
            .map(|node| node.id())
            .collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);

        // A second registry starts its own sequence.
        let other = Registry::new();
        let volume = other.register_driver(sample_driver("a")).unwrap();
        assert_eq!(volume.root().id(), first.root().id());
    }
}
