//! IPC protocol definitions for the filesystem service.
//!
//! Request ids are contiguous from 0 inside the service's id range. Request
//! and response bodies travel as JSON.

use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::config::FSS_NAME_MAX;
use crate::types::{EventMask, Handle, NodeType};

/// Filesystem service request ids.
pub mod fss_msg {
    /// Open a file by name
    pub const FSS_REQ_OPEN: u32 = 0;
    /// Close a handle
    pub const FSS_REQ_CLOSE: u32 = 1;
    /// Read one block
    pub const FSS_REQ_READ: u32 = 2;
    /// Write one block
    pub const FSS_REQ_WRITE: u32 = 3;
    /// Enumerate a directory
    pub const FSS_REQ_READDIR: u32 = 4;
    /// Register or unregister event interest
    pub const FSS_REQ_NOTIFY: u32 = 5;
    /// Map or unmap a file
    pub const FSS_REQ_MAP: u32 = 6;
    /// Size of the request id range
    pub const FSS_REQ_MAX: usize = 7;

    /// Notify op: add a subscription
    pub const NOTIFY_OP_REGISTER: u32 = 1;
    /// Notify op: remove events from subscriptions
    pub const NOTIFY_OP_UNREGISTER: u32 = 2;

    /// Map op: map the file
    pub const MAP_OP_MAP: u32 = 1;
    /// Map op: unmap the file
    pub const MAP_OP_UNMAP: u32 = 2;
}

// ============================================================================
// Open / Close
// ============================================================================

/// Open request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpenRequest {
    /// `volume:path` or a path on the default volume
    pub name: String,
}

/// Open response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenResponse {
    /// Allocated capability
    pub handle: Handle,
    /// Current file size
    pub size: u64,
}

/// Close request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CloseRequest {
    pub handle: Handle,
}

// ============================================================================
// Read / Write
// ============================================================================

/// Read request. The data lands in the caller's buffer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReadRequest {
    pub handle: Handle,
    /// Byte offset, block aligned
    pub offset: u64,
    /// Must equal the cache block size
    pub size: usize,
}

/// Write request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WriteRequest {
    pub handle: Handle,
    /// Byte offset, block aligned
    pub offset: u64,
    /// Must equal the cache block size
    pub size: usize,
    /// Exactly `size` bytes
    pub data: Vec<u8>,
}

/// Read/write response. `file_size` is filled in even on failure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IoResponse {
    /// Valid bytes in the block, 0 on failure
    pub transferred: usize,
    /// Current file size
    pub file_size: u64,
    /// Block contents (reads only)
    pub data: Vec<u8>,
}

// ============================================================================
// Readdir
// ============================================================================

/// Size of a readdir record header: type byte and name length byte
pub const DIRENT_HEADER_SIZE: usize = 2;

/// Readdir request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReaddirRequest {
    pub handle: Handle,
    /// Number of entries to skip
    pub start_entry: u32,
    /// Output buffer capacity in bytes
    pub max_size: u32,
}

/// Readdir response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReaddirResponse {
    /// Bytes of packed records
    pub written: usize,
    /// Cursor to pass as `start_entry` to continue
    pub next_entry: u32,
    /// Packed `[type][name_len][name]` records
    pub records: Vec<u8>,
}

/// One decoded readdir record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirRecord {
    pub kind: NodeType,
    pub name: String,
}

/// Append one record to `out` at `at`; returns the bytes used.
///
/// `out` must have room for the header plus `name.len()` bytes, and
/// `name.len()` must not exceed [`FSS_NAME_MAX`].
pub(crate) fn pack_record(out: &mut [u8], at: usize, kind: NodeType, name: &[u8]) -> usize {
    debug_assert!(name.len() <= FSS_NAME_MAX);
    out[at] = kind.to_byte();
    out[at + 1] = name.len() as u8;
    out[at + DIRENT_HEADER_SIZE..at + DIRENT_HEADER_SIZE + name.len()].copy_from_slice(name);
    DIRENT_HEADER_SIZE + name.len()
}

/// Decode packed readdir records. Stops at the first malformed record.
pub fn parse_records(bytes: &[u8]) -> Vec<DirRecord> {
    let mut records = Vec::new();
    let mut at = 0;
    while at + DIRENT_HEADER_SIZE <= bytes.len() {
        let Some(kind) = NodeType::from_byte(bytes[at]) else {
            break;
        };
        let len = bytes[at + 1] as usize;
        let start = at + DIRENT_HEADER_SIZE;
        if start + len > bytes.len() {
            break;
        }
        records.push(DirRecord {
            kind,
            name: String::from_utf8_lossy(&bytes[start..start + len]).into_owned(),
        });
        at = start + len;
    }
    records
}

// ============================================================================
// Notify / Map
// ============================================================================

/// Notify request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotifyRequest {
    pub handle: Handle,
    pub mask: EventMask,
    /// `NOTIFY_OP_REGISTER` or `NOTIFY_OP_UNREGISTER`
    pub op: u32,
    /// Passed back to the subscriber on every event
    pub context: u64,
}

/// Map request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapRequest {
    pub handle: Handle,
    /// Protection bits (see `Protection::from_byte`)
    pub protection: u8,
    /// `MAP_OP_MAP` or `MAP_OP_UNMAP`
    pub op: u32,
}

/// Map response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapResponse {
    pub base: u64,
    pub size: u64,
}
