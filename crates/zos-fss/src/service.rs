//! Filesystem service state.
//!
//! All service state is built explicitly by [`FileSystemService::new`] and
//! owned by the returned value; nothing lives in globals, so tests can run
//! isolated instances side by side.

use alloc::sync::Arc;
use alloc::vec::Vec;

use tracing::info;

use crate::cache::BlockCache;
use crate::config::FssConfig;
use crate::dispatch::Dispatcher;
use crate::driver::FsDriver;
use crate::error::FssResult;
use crate::handle::{CapabilityTable, HandleTable};
use crate::mmap::MemoryMapper;
use crate::notify::NotifyHub;
use crate::registry::Registry;
use crate::volume::Volume;

/// Service registration info handed to the kernel service framework.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub service_id_base: u32,
}

/// The filesystem service: registry, cache and collaborators.
pub struct FileSystemService<T: HandleTable, M: MemoryMapper> {
    pub(crate) config: FssConfig,
    pub(crate) registry: Arc<Registry>,
    pub(crate) cache: BlockCache,
    pub(crate) handles: T,
    pub(crate) notify: Arc<NotifyHub>,
    pub(crate) mapper: M,
    dispatcher: Dispatcher<T, M>,
}

impl<M: MemoryMapper> FileSystemService<CapabilityTable, M> {
    /// Service with a fresh registry and the built-in capability table.
    pub fn with_defaults(config: FssConfig, mapper: M, notify: NotifyHub) -> FssResult<Self> {
        let handles = CapabilityTable::new(config.max_handles);
        Self::new(config, Arc::new(Registry::new()), handles, mapper, Arc::new(notify))
    }
}

impl<T: HandleTable, M: MemoryMapper> FileSystemService<T, M> {
    /// Build the service from its collaborators.
    pub fn new(
        config: FssConfig,
        registry: Arc<Registry>,
        handles: T,
        mapper: M,
        notify: Arc<NotifyHub>,
    ) -> FssResult<Self> {
        config.validate()?;
        let cache = BlockCache::new(&config, notify.clone());
        info!(
            max_descriptors = config.max_descriptors,
            max_handles = config.max_handles,
            "filesystem service initialized"
        );
        Ok(Self {
            config,
            registry,
            cache,
            handles,
            notify,
            mapper,
            dispatcher: Dispatcher::new(),
        })
    }

    /// Registration info for the kernel service framework.
    pub fn service_info(&self) -> ServiceInfo {
        ServiceInfo {
            name: "FSS",
            service_id_base: self.config.service_id_base,
        }
    }

    /// Register a driver and mount its volume.
    pub fn register_driver(&self, driver: Arc<dyn FsDriver>) -> FssResult<Arc<Volume>> {
        self.registry.register_driver(driver)
    }

    pub fn config(&self) -> &FssConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }

    pub fn handles(&self) -> &T {
        &self.handles
    }

    pub fn notify(&self) -> &NotifyHub {
        &self.notify
    }

    /// Service entry point: `req_id` is the absolute request id.
    ///
    /// Returns the status code and the serialized response body.
    pub fn kernel_srv(&self, req_id: u32, payload: &[u8]) -> (i64, Vec<u8>) {
        match req_id.checked_sub(self.config.service_id_base) {
            Some(local) => self.dispatcher.dispatch(self, local, payload),
            None => self.dispatcher.dispatch(self, u32::MAX, payload),
        }
    }
}
