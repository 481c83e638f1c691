//! Core filesystem service types
//!
//! Identifiers, node types and the small bit sets shared across the tree,
//! the cache and the request handlers.

use serde::{Deserialize, Serialize};

/// Unique in-memory node identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Capability handle exchanged with the syscall layer
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Handle(pub u32);

/// Opaque driver-private handle returned by `mount` and `open`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DriverHandle(pub u64);

/// Node type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    /// Regular file
    Regular,
    /// Directory
    Directory,
}

impl NodeType {
    /// Wire encoding used in readdir records.
    pub fn to_byte(self) -> u8 {
        match self {
            NodeType::Regular => 1,
            NodeType::Directory => 2,
        }
    }

    /// Decode a readdir record type byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(NodeType::Regular),
            2 => Some(NodeType::Directory),
            _ => None,
        }
    }
}

/// A directory entry as reported by a driver's `enumerate`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverEntry {
    /// Entry name
    pub name: alloc::string::String,
    /// Entry type
    pub kind: NodeType,
}

/// Event kinds emitted after block I/O completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileEvent {
    /// A block was read
    Read,
    /// A block was written
    Write,
}

/// Set of events a subscription listens for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMask(pub u32);

impl EventMask {
    /// Block read completed
    pub const READ: EventMask = EventMask(1 << 0);
    /// Block write completed
    pub const WRITE: EventMask = EventMask(1 << 1);
    /// Every event
    pub const ALL: EventMask = EventMask(Self::READ.0 | Self::WRITE.0);

    /// Mask bit for an event.
    pub fn of(event: FileEvent) -> Self {
        match event {
            FileEvent::Read => Self::READ,
            FileEvent::Write => Self::WRITE,
        }
    }

    /// True if every bit of `other` is set in `self`.
    pub fn contains(self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if no bits are set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Bits of `self` not in `other`.
    pub fn without(self, other: EventMask) -> Self {
        EventMask(self.0 & !other.0)
    }
}

/// Protection requested for a memory mapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protection {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl Protection {
    /// Create from a byte representation.
    pub fn from_byte(byte: u8) -> Self {
        Self {
            read: byte & 0x01 != 0,
            write: byte & 0x02 != 0,
            execute: byte & 0x04 != 0,
        }
    }

    /// Convert to byte representation.
    pub fn to_byte(&self) -> u8 {
        let mut byte = 0u8;
        if self.read {
            byte |= 0x01;
        }
        if self.write {
            byte |= 0x02;
        }
        if self.execute {
            byte |= 0x04;
        }
        byte
    }
}
