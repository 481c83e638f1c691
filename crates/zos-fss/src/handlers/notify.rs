//! Event subscription requests.

use crate::error::{FssError, FssResult};
use crate::handle::HandleTable;
use crate::ipc::fss_msg::{NOTIFY_OP_REGISTER, NOTIFY_OP_UNREGISTER};
use crate::ipc::NotifyRequest;
use crate::mmap::MemoryMapper;
use crate::service::FileSystemService;

impl<T: HandleTable, M: MemoryMapper> FileSystemService<T, M> {
    /// Register or unregister interest in a node's events.
    pub fn notify_request(&self, req: &NotifyRequest) -> FssResult<()> {
        if req.op != NOTIFY_OP_REGISTER && req.op != NOTIFY_OP_UNREGISTER {
            return Err(FssError::BadArgument);
        }
        let node = self
            .handles
            .translate(req.handle)
            .ok_or(FssError::BadArgument)?;

        let result = if req.op == NOTIFY_OP_REGISTER {
            self.notify.register_delivery(&node, req.mask, req.context)
        } else {
            self.notify.unregister(&node, req.mask)
        };

        self.handles.put(req.handle, node);
        result
    }
}
