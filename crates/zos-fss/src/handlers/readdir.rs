//! Cursor-based directory enumeration.
//!
//! The cursor is an index into the directory's child list. Children are
//! only ever appended by materialization, so a cursor stays meaningful for
//! a settled directory; it is not protected against concurrent edits.

use alloc::sync::Arc;

use crate::config::FSS_NAME_MAX;
use crate::error::{FssError, FssResult};
use crate::handle::HandleTable;
use crate::ipc::{pack_record, ReaddirRequest, DIRENT_HEADER_SIZE};
use crate::mmap::MemoryMapper;
use crate::node::FileNode;
use crate::service::FileSystemService;

use super::ReaddirOutcome;

impl<T: HandleTable, M: MemoryMapper> FileSystemService<T, M> {
    /// Pack directory entries into `out`, starting at `req.start_entry`.
    ///
    /// `out` must hold at least `req.max_size` bytes.
    pub fn readdir(&self, req: &ReaddirRequest, out: &mut [u8]) -> FssResult<ReaddirOutcome> {
        let max_size = req.max_size as usize;
        if max_size == 0 || out.len() < max_size {
            return Err(FssError::BadArgument);
        }

        let node = self
            .handles
            .translate(req.handle)
            .ok_or(FssError::BadFileDescriptor)?;
        let result = pack_entries(&node, req.start_entry, &mut out[..max_size]);
        self.handles.put(req.handle, node);
        result
    }
}

fn pack_entries(dir: &Arc<FileNode>, start_entry: u32, out: &mut [u8]) -> FssResult<ReaddirOutcome> {
    if !dir.is_directory() {
        return Err(FssError::NotADirectory);
    }
    dir.materialize().map_err(|_| FssError::IoError)?;

    let children = dir.children();
    let mut written = 0usize;
    let mut copied = 0u32;

    for child in children.iter().skip(start_entry as usize) {
        let name = child.name().as_bytes();
        let full = name.len().min(FSS_NAME_MAX);
        let remaining = out.len() - written;

        let len = if DIRENT_HEADER_SIZE + full <= remaining {
            full
        } else if copied == 0 && remaining > DIRENT_HEADER_SIZE {
            // A buffer too small for the first name still makes progress.
            remaining - DIRENT_HEADER_SIZE
        } else {
            break;
        };

        written += pack_record(out, written, child.kind(), &name[..len]);
        copied += 1;
    }

    Ok(ReaddirOutcome {
        written,
        next_entry: start_entry.saturating_add(copied),
    })
}
