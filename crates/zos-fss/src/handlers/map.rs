//! File mapping requests.

use tracing::warn;

use crate::error::{FssError, FssResult};
use crate::handle::HandleTable;
use crate::ipc::fss_msg::{MAP_OP_MAP, MAP_OP_UNMAP};
use crate::ipc::{MapRequest, MapResponse};
use crate::mmap::MemoryMapper;
use crate::service::FileSystemService;
use crate::types::Protection;

impl<T: HandleTable, M: MemoryMapper> FileSystemService<T, M> {
    /// Map a file into memory. Unmapping is not implemented.
    pub fn map(&self, req: &MapRequest) -> FssResult<MapResponse> {
        match req.op {
            MAP_OP_MAP => {}
            MAP_OP_UNMAP => return Err(FssError::NotSupported),
            _ => return Err(FssError::BadArgument),
        }

        let node = self
            .handles
            .translate(req.handle)
            .ok_or(FssError::BadFileDescriptor)?;
        let size = node.file_size();
        let result = match self
            .mapper
            .map_file(&node, size, Protection::from_byte(req.protection))
        {
            Some(base) => Ok(MapResponse { base, size }),
            None => {
                warn!(node = %node.path(), size, "file mapping failed");
                Err(FssError::OutOfMemory)
            }
        };
        self.handles.put(req.handle, node);
        result
    }
}
