//! Block read and write.

use crate::cache::BlockIo;
use crate::config::FSS_CACHE_DB_SIZE;
use crate::error::FssError;
use crate::handle::HandleTable;
use crate::ipc::{ReadRequest, WriteRequest};
use crate::mmap::MemoryMapper;
use crate::service::FileSystemService;
use crate::types::Handle;

use super::IoOutcome;

/// Block index for a block-sized transfer at `offset`.
fn block_index(offset: u64, size: usize) -> Result<u64, FssError> {
    if size != FSS_CACHE_DB_SIZE || offset % FSS_CACHE_DB_SIZE as u64 != 0 {
        return Err(FssError::BadArgument);
    }
    Ok(offset / FSS_CACHE_DB_SIZE as u64)
}

impl<T: HandleTable, M: MemoryMapper> FileSystemService<T, M> {
    /// Read one block into `buf`.
    pub fn read(&self, req: &ReadRequest, buf: &mut [u8]) -> IoOutcome {
        let block = match block_index(req.offset, req.size) {
            Ok(block) if buf.len() >= req.size => block,
            Ok(_) => return IoOutcome::rejected(FssError::BadArgument),
            Err(e) => return IoOutcome::rejected(e),
        };
        self.transfer(req.handle, block, BlockIo::Read(&mut buf[..req.size]))
    }

    /// Write one block from the request data.
    pub fn write(&self, req: &WriteRequest) -> IoOutcome {
        let block = match block_index(req.offset, req.size) {
            Ok(block) if req.data.len() == req.size => block,
            Ok(_) => return IoOutcome::rejected(FssError::BadArgument),
            Err(e) => return IoOutcome::rejected(e),
        };
        self.transfer(req.handle, block, BlockIo::Write(&req.data))
    }

    fn transfer(&self, handle: Handle, block: u64, io: BlockIo<'_>) -> IoOutcome {
        let Some(node) = self.handles.translate(handle) else {
            return IoOutcome::rejected(FssError::BadFileDescriptor);
        };
        let result = self.cache.block_io(&node, block, io);
        let file_size = node.file_size();
        self.handles.put(handle, node);
        IoOutcome { result, file_size }
    }
}
