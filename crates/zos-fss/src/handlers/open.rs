//! Open and close.

use tracing::{debug, warn};

use crate::error::{FssError, FssResult};
use crate::handle::HandleTable;
use crate::ipc::{CloseRequest, OpenRequest, OpenResponse};
use crate::mmap::MemoryMapper;
use crate::service::FileSystemService;
use crate::tree;

impl<T: HandleTable, M: MemoryMapper> FileSystemService<T, M> {
    /// Open a file and allocate a capability for it.
    ///
    /// There is no per-process current directory yet: names resolve from
    /// the root of the selected volume.
    pub fn open(&self, req: &OpenRequest) -> FssResult<OpenResponse> {
        let (root, path) = self.registry.resolve(&req.name)?;
        let node = tree::open(&root, path)?;
        let size = node.file_size();

        match self.handles.create(node.clone()) {
            Ok(handle) => {
                debug!(name = %req.name, handle = handle.0, size, "open");
                Ok(OpenResponse { handle, size })
            }
            Err(e) => {
                warn!(name = %req.name, error = ?e, "capability allocation failed, closing node");
                tree::close(&node);
                Err(e)
            }
        }
    }

    /// Close a capability and the node behind it.
    pub fn close(&self, req: &CloseRequest) -> FssResult<()> {
        let node = self
            .handles
            .delete(req.handle)
            .ok_or(FssError::BadFileDescriptor)?;
        tree::close(&node);
        debug!(handle = req.handle.0, "close");
        Ok(())
    }
}
