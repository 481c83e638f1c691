//! Shared fixtures for unit tests.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::config::{FssConfig, FSS_CACHE_DB_SIZE};
use crate::handle::CapabilityTable;
use crate::memory::MemoryDriver;
use crate::mmap::MemoryMapper;
use crate::node::FileNode;
use crate::notify::NotifyHub;
use crate::service::FileSystemService;
use crate::types::Protection;

/// Mapper returning a fixed base address, or failing when `base` is `None`.
pub struct StubMapper {
    pub base: Option<u64>,
    pub calls: AtomicUsize,
}

impl StubMapper {
    pub fn new(base: Option<u64>) -> Self {
        Self {
            base,
            calls: AtomicUsize::new(0),
        }
    }
}

impl MemoryMapper for StubMapper {
    fn map_file(&self, _node: &FileNode, _size: u64, _protection: Protection) -> Option<u64> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        self.base
    }
}

pub type TestService = FileSystemService<CapabilityTable, StubMapper>;

/// Contents of `/data`: one full block and a 100-byte tail.
pub fn data_content() -> Vec<u8> {
    let mut content = vec![0xAB; FSS_CACHE_DB_SIZE];
    content.extend_from_slice(&[0xCD; 100]);
    content
}

/// A driver holding:
///
/// ```text
/// /docs/readme     "hello"
/// /data            data_content()
/// /list/{a,b,c,d}  empty files
/// ```
pub fn sample_driver(name: &str) -> Arc<MemoryDriver> {
    let driver = Arc::new(MemoryDriver::new(name));
    driver.add_dir("/docs");
    driver.add_file("/docs/readme", b"hello");
    driver.add_file("/data", &data_content());
    driver.add_dir("/list");
    for entry in ["a", "b", "c", "d"] {
        driver.add_file(&alloc::format!("/list/{}", entry), b"");
    }
    driver
}

pub fn service_with(config: FssConfig, mapper: StubMapper, notify: NotifyHub) -> TestService {
    match FileSystemService::with_defaults(config, mapper, notify) {
        Ok(service) => service,
        Err(e) => panic!("service init failed: {}", e),
    }
}

/// Service with the sample driver mounted as volume `mem`.
pub fn mounted_service() -> (Arc<MemoryDriver>, TestService) {
    let service = service_with(
        FssConfig::default(),
        StubMapper::new(Some(0x4000_0000)),
        NotifyHub::new(),
    );
    let driver = sample_driver("mem");
    service.register_driver(driver.clone()).unwrap();
    (driver, service)
}
