//! Zero OS Filesystem Service
//!
//! The in-kernel half of the filesystem: it sits between the syscall layer
//! and pluggable filesystem drivers.
//!
//! - **Registry**: registered drivers and the volumes they mount
//! - **Tree**: lazily materialized file nodes, reference counted
//! - **Cache**: page-granular block cache with dirty tracking
//! - **Notify**: per-node read/write event subscriptions
//! - **Handlers**: open, close, read, write, readdir, notify and map
//! - **Dispatch**: request id table feeding the handlers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Syscall layer / IPC                               │
//! │            kernel_srv(req_id, payload) ─▶ Dispatcher                    │
//! └──────────────────────────────────┬──────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      FileSystemService                                  │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌─────────────────────────┐    │
//! │  │  HandleTable   │  │   NotifyHub    │  │     MemoryMapper        │    │
//! │  │ handle ↔ node  │  │ event delivery │  │  map_file(node, size)   │    │
//! │  └───────┬────────┘  └───────▲────────┘  └─────────────────────────┘    │
//! │          │                   │                                          │
//! │          ▼                   │                                          │
//! │  ┌────────────────┐  ┌───────┴────────┐                                 │
//! │  │   Node tree    │◀─│   BlockCache   │  (node, block) → descriptor     │
//! │  │ lookup / open  │  │ VALID | DIRTY  │                                 │
//! │  └───────┬────────┘  └───────┬────────┘                                 │
//! │          │                   │                                          │
//! │          ▼                   ▼                                          │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │ Registry: drivers and mounted volumes                            │   │
//! │  └──────────────────────────────┬───────────────────────────────────┘   │
//! └─────────────────────────────────┼───────────────────────────────────────┘
//!                                   ▼
//!                        FsDriver (mount, open, read,
//!                        write, close, enumerate, size)
//! ```

#![no_std]
extern crate alloc;

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod handle;
pub mod handlers;
pub mod ipc;
pub mod memory;
pub mod mmap;
pub mod node;
pub mod notify;
pub mod registry;
pub mod service;
pub mod tree;
pub mod types;
pub mod volume;

// Re-export main types
pub use cache::{BlockCache, BlockDescriptor, BlockIo, DbdFlags};
pub use config::{FssConfig, FSS_CACHE_DB_SIZE, FSS_NAME_MAX};
pub use driver::FsDriver;
pub use error::{DriverError, FssError, FssResult};
pub use handle::{CapabilityTable, HandleTable};
pub use handlers::{IoOutcome, ReaddirOutcome};
pub use memory::MemoryDriver;
pub use mmap::MemoryMapper;
pub use node::FileNode;
pub use notify::{NotifyCallback, NotifyHub};
pub use registry::Registry;
pub use service::{FileSystemService, ServiceInfo};
pub use types::{DriverEntry, DriverHandle, EventMask, FileEvent, Handle, NodeId, NodeType, Protection};
pub use volume::Volume;

// IPC message constants
pub use ipc::fss_msg;

#[cfg(test)]
mod testing;
