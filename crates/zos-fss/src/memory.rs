//! In-memory filesystem driver for testing.
//!
//! Keeps files and directories in a path-keyed map and counts every driver
//! call so tests can tell cache hits from driver round trips. Individual
//! operations can be made to fail.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use spin::Mutex;

use crate::config::FSS_CACHE_DB_SIZE;
use crate::driver::FsDriver;
use crate::error::DriverError;
use crate::types::{DriverEntry, DriverHandle, NodeType};

/// Driver operations that can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    Mount,
    Open,
    Read,
    Write,
    Enumerate,
}

impl Fault {
    fn bit(self) -> u32 {
        match self {
            Fault::Mount => 1 << 0,
            Fault::Open => 1 << 1,
            Fault::Read => 1 << 2,
            Fault::Write => 1 << 3,
            Fault::Enumerate => 1 << 4,
        }
    }
}

/// Snapshot of driver call counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriverCalls {
    pub mount: usize,
    pub open: usize,
    pub read: usize,
    pub write: usize,
    pub close: usize,
    pub enumerate: usize,
}

#[derive(Default)]
struct CallCounters {
    mount: AtomicUsize,
    open: AtomicUsize,
    read: AtomicUsize,
    write: AtomicUsize,
    close: AtomicUsize,
    enumerate: AtomicUsize,
}

enum Entry {
    File(Vec<u8>),
    Dir(Vec<String>),
}

struct State {
    entries: BTreeMap<String, Entry>,
    handles: BTreeMap<u64, String>,
    next_handle: u64,
}

/// In-memory driver.
pub struct MemoryDriver {
    name: String,
    state: Mutex<State>,
    calls: CallCounters,
    faults: AtomicU32,
    /// Busy-wait iterations inside `enumerate`, to widen race windows
    enumerate_spin: AtomicUsize,
}

fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        alloc::format!("/{}", name)
    } else {
        alloc::format!("{}/{}", dir, name)
    }
}

fn split(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(0) => ("/", &path[1..]),
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("/", path),
    }
}

impl MemoryDriver {
    /// Create a driver with an empty root directory.
    pub fn new(name: &str) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(String::from("/"), Entry::Dir(Vec::new()));
        Self {
            name: String::from(name),
            state: Mutex::new(State {
                entries,
                handles: BTreeMap::new(),
                next_handle: 1,
            }),
            calls: CallCounters::default(),
            faults: AtomicU32::new(0),
            enumerate_spin: AtomicUsize::new(0),
        }
    }

    fn insert(&self, path: &str, entry: Entry) {
        let (parent, name) = split(path);
        let mut state = self.state.lock();
        if let Some(Entry::Dir(children)) = state.entries.get_mut(parent) {
            if !children.iter().any(|c| c == name) {
                children.push(String::from(name));
            }
        }
        state.entries.insert(String::from(path), entry);
    }

    /// Add a directory. The parent must exist.
    pub fn add_dir(&self, path: &str) {
        self.insert(path, Entry::Dir(Vec::new()));
    }

    /// Add a file. The parent must exist.
    pub fn add_file(&self, path: &str, content: &[u8]) {
        self.insert(path, Entry::File(content.to_vec()));
    }

    /// Current content of a file.
    pub fn file_content(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.lock().entries.get(path) {
            Some(Entry::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// Make `fault` fail (or succeed again).
    pub fn set_fault(&self, fault: Fault, failing: bool) {
        if failing {
            self.faults.fetch_or(fault.bit(), Ordering::AcqRel);
        } else {
            self.faults.fetch_and(!fault.bit(), Ordering::AcqRel);
        }
    }

    /// Busy-wait this many iterations in every `enumerate` call.
    pub fn set_enumerate_spin(&self, iterations: usize) {
        self.enumerate_spin.store(iterations, Ordering::Relaxed);
    }

    /// Call counts so far.
    pub fn calls(&self) -> DriverCalls {
        DriverCalls {
            mount: self.calls.mount.load(Ordering::Acquire),
            open: self.calls.open.load(Ordering::Acquire),
            read: self.calls.read.load(Ordering::Acquire),
            write: self.calls.write.load(Ordering::Acquire),
            close: self.calls.close.load(Ordering::Acquire),
            enumerate: self.calls.enumerate.load(Ordering::Acquire),
        }
    }

    /// Number of handles not yet closed.
    pub fn open_handles(&self) -> usize {
        self.state.lock().handles.len()
    }

    fn failing(&self, fault: Fault) -> bool {
        self.faults.load(Ordering::Acquire) & fault.bit() != 0
    }

    fn new_handle(state: &mut State, path: String) -> DriverHandle {
        let id = state.next_handle;
        state.next_handle += 1;
        state.handles.insert(id, path);
        DriverHandle(id)
    }
}

impl FsDriver for MemoryDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn mount(&self, root: Option<&str>) -> Result<DriverHandle, DriverError> {
        self.calls.mount.fetch_add(1, Ordering::AcqRel);
        if self.failing(Fault::Mount) {
            return Err(DriverError::Io);
        }
        let root = String::from(root.unwrap_or("/"));
        let mut state = self.state.lock();
        match state.entries.get(&root) {
            Some(Entry::Dir(_)) => Ok(Self::new_handle(&mut state, root)),
            _ => Err(DriverError::NotFound),
        }
    }

    fn open(&self, parent: DriverHandle, name: &str) -> Result<DriverHandle, DriverError> {
        self.calls.open.fetch_add(1, Ordering::AcqRel);
        if self.failing(Fault::Open) {
            return Err(DriverError::Io);
        }
        let mut state = self.state.lock();
        let dir = state.handles.get(&parent.0).ok_or(DriverError::NotFound)?;
        let path = join(dir, name);
        if !state.entries.contains_key(&path) {
            return Err(DriverError::NotFound);
        }
        Ok(Self::new_handle(&mut state, path))
    }

    fn read(&self, handle: DriverHandle, block: u64, buf: &mut [u8]) -> Result<usize, DriverError> {
        self.calls.read.fetch_add(1, Ordering::AcqRel);
        if self.failing(Fault::Read) {
            return Err(DriverError::Io);
        }
        let state = self.state.lock();
        let path = state.handles.get(&handle.0).ok_or(DriverError::NotFound)?;
        let Some(Entry::File(data)) = state.entries.get(path) else {
            return Err(DriverError::Unsupported);
        };

        buf.fill(0);
        let start = (block as usize).saturating_mul(FSS_CACHE_DB_SIZE);
        if start >= data.len() {
            return Ok(0);
        }
        let len = (data.len() - start).min(buf.len());
        buf[..len].copy_from_slice(&data[start..start + len]);
        Ok(len)
    }

    fn write(&self, handle: DriverHandle, block: u64, buf: &[u8]) -> Result<usize, DriverError> {
        self.calls.write.fetch_add(1, Ordering::AcqRel);
        if self.failing(Fault::Write) {
            return Err(DriverError::Io);
        }
        let mut state = self.state.lock();
        let path = state
            .handles
            .get(&handle.0)
            .cloned()
            .ok_or(DriverError::NotFound)?;
        let Some(Entry::File(data)) = state.entries.get_mut(&path) else {
            return Err(DriverError::Unsupported);
        };

        let start = (block as usize).saturating_mul(FSS_CACHE_DB_SIZE);
        let end = start + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn close(&self, handle: DriverHandle) {
        self.calls.close.fetch_add(1, Ordering::AcqRel);
        self.state.lock().handles.remove(&handle.0);
    }

    fn enumerate(&self, dir: DriverHandle) -> Result<Vec<DriverEntry>, DriverError> {
        self.calls.enumerate.fetch_add(1, Ordering::AcqRel);
        for _ in 0..self.enumerate_spin.load(Ordering::Relaxed) {
            core::hint::spin_loop();
        }
        if self.failing(Fault::Enumerate) {
            return Err(DriverError::Io);
        }
        let state = self.state.lock();
        let path = state.handles.get(&dir.0).ok_or(DriverError::NotFound)?;
        let Some(Entry::Dir(children)) = state.entries.get(path) else {
            return Err(DriverError::Unsupported);
        };

        Ok(children
            .iter()
            .map(|name| {
                let kind = match state.entries.get(&join(path, name)) {
                    Some(Entry::Dir(_)) => NodeType::Directory,
                    _ => NodeType::Regular,
                };
                DriverEntry {
                    name: name.clone(),
                    kind,
                }
            })
            .collect())
    }

    fn size(&self, handle: DriverHandle) -> Result<u64, DriverError> {
        let state = self.state.lock();
        let path = state.handles.get(&handle.0).ok_or(DriverError::NotFound)?;
        match state.entries.get(path) {
            Some(Entry::File(data)) => Ok(data.len() as u64),
            Some(Entry::Dir(_)) => Ok(0),
            None => Err(DriverError::NotFound),
        }
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
