//! Request dispatch.
//!
//! A fixed table indexed by the service-local request id. Every slot starts
//! out as the not-implemented handler before the known requests are filled
//! in, so an id without a handler still gets a well-formed reply.
//!
//! Handlers decode a JSON request body, run the typed handler and return
//! `(status, response body)`: status is non-negative on success and a
//! negative errno on failure.

use alloc::vec;
use alloc::vec::Vec;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::config::{FSS_CACHE_DB_SIZE, FSS_READDIR_MAX};
use crate::error::{FssError, FssResult};
use crate::handle::HandleTable;
use crate::ipc::fss_msg::*;
use crate::ipc::{
    CloseRequest, IoResponse, MapRequest, NotifyRequest, OpenRequest, ReadRequest,
    ReaddirRequest, ReaddirResponse, WriteRequest,
};
use crate::mmap::MemoryMapper;
use crate::service::FileSystemService;

/// Raw request handler.
pub type RawHandler<T, M> = fn(&FileSystemService<T, M>, &[u8]) -> (i64, Vec<u8>);

/// Request id → handler table.
pub struct Dispatcher<T: HandleTable, M: MemoryMapper> {
    table: [RawHandler<T, M>; FSS_REQ_MAX],
}

impl<T: HandleTable, M: MemoryMapper> Default for Dispatcher<T, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: HandleTable, M: MemoryMapper> Dispatcher<T, M> {
    pub fn new() -> Self {
        let unimplemented: RawHandler<T, M> = req_not_implemented::<T, M>;
        let mut table = [unimplemented; FSS_REQ_MAX];
        table[FSS_REQ_OPEN as usize] = req_open::<T, M>;
        table[FSS_REQ_CLOSE as usize] = req_close::<T, M>;
        table[FSS_REQ_READ as usize] = req_read::<T, M>;
        table[FSS_REQ_WRITE as usize] = req_write::<T, M>;
        table[FSS_REQ_READDIR as usize] = req_readdir::<T, M>;
        table[FSS_REQ_NOTIFY as usize] = req_notify::<T, M>;
        table[FSS_REQ_MAP as usize] = req_map::<T, M>;
        Self { table }
    }

    /// Run the handler for service-local request `req_id`.
    pub fn dispatch(
        &self,
        service: &FileSystemService<T, M>,
        req_id: u32,
        payload: &[u8],
    ) -> (i64, Vec<u8>) {
        trace!(req_id, len = payload.len(), "fss request");
        match self.table.get(req_id as usize) {
            Some(handler) => handler(service, payload),
            None => req_not_implemented(service, payload),
        }
    }
}

fn decode<Q: DeserializeOwned>(payload: &[u8]) -> FssResult<Q> {
    serde_json::from_slice(payload).map_err(|_| FssError::BadArgument)
}

fn encode<R: Serialize>(body: &R) -> Vec<u8> {
    serde_json::to_vec(body).unwrap_or_default()
}

fn reply<R: Serialize>(result: FssResult<R>) -> (i64, Vec<u8>) {
    match result {
        Ok(body) => (0, encode(&body)),
        Err(e) => (e.errno(), Vec::new()),
    }
}

fn req_not_implemented<T: HandleTable, M: MemoryMapper>(
    _service: &FileSystemService<T, M>,
    _payload: &[u8],
) -> (i64, Vec<u8>) {
    (FssError::NotSupported.errno(), Vec::new())
}

fn req_open<T: HandleTable, M: MemoryMapper>(
    service: &FileSystemService<T, M>,
    payload: &[u8],
) -> (i64, Vec<u8>) {
    reply(decode::<OpenRequest>(payload).and_then(|req| service.open(&req)))
}

fn req_close<T: HandleTable, M: MemoryMapper>(
    service: &FileSystemService<T, M>,
    payload: &[u8],
) -> (i64, Vec<u8>) {
    reply(decode::<CloseRequest>(payload).and_then(|req| service.close(&req)))
}

fn req_read<T: HandleTable, M: MemoryMapper>(
    service: &FileSystemService<T, M>,
    payload: &[u8],
) -> (i64, Vec<u8>) {
    let req: ReadRequest = match decode(payload) {
        Ok(req) => req,
        Err(e) => return (e.errno(), Vec::new()),
    };
    if req.size > FSS_CACHE_DB_SIZE {
        return (FssError::BadArgument.errno(), Vec::new());
    }
    let mut data = vec![0u8; req.size];
    let outcome = service.read(&req, &mut data);
    let (status, transferred) = match outcome.result {
        Ok(n) => (n as i64, n),
        Err(e) => {
            data.clear();
            (e.errno(), 0)
        }
    };
    let body = IoResponse {
        transferred,
        file_size: outcome.file_size,
        data,
    };
    (status, encode(&body))
}

fn req_write<T: HandleTable, M: MemoryMapper>(
    service: &FileSystemService<T, M>,
    payload: &[u8],
) -> (i64, Vec<u8>) {
    let req: WriteRequest = match decode(payload) {
        Ok(req) => req,
        Err(e) => return (e.errno(), Vec::new()),
    };
    let outcome = service.write(&req);
    let (status, transferred) = match outcome.result {
        Ok(n) => (n as i64, n),
        Err(e) => (e.errno(), 0),
    };
    let body = IoResponse {
        transferred,
        file_size: outcome.file_size,
        data: Vec::new(),
    };
    (status, encode(&body))
}

fn req_readdir<T: HandleTable, M: MemoryMapper>(
    service: &FileSystemService<T, M>,
    payload: &[u8],
) -> (i64, Vec<u8>) {
    let req: ReaddirRequest = match decode(payload) {
        Ok(req) => req,
        Err(e) => return (e.errno(), Vec::new()),
    };
    if req.max_size as usize > FSS_READDIR_MAX {
        return (FssError::BadArgument.errno(), Vec::new());
    }
    let mut records = vec![0u8; req.max_size as usize];
    match service.readdir(&req, &mut records) {
        Ok(outcome) => {
            records.truncate(outcome.written);
            let body = ReaddirResponse {
                written: outcome.written,
                next_entry: outcome.next_entry,
                records,
            };
            (outcome.written as i64, encode(&body))
        }
        Err(e) => (e.errno(), Vec::new()),
    }
}

fn req_notify<T: HandleTable, M: MemoryMapper>(
    service: &FileSystemService<T, M>,
    payload: &[u8],
) -> (i64, Vec<u8>) {
    reply(decode::<NotifyRequest>(payload).and_then(|req| service.notify_request(&req)))
}

fn req_map<T: HandleTable, M: MemoryMapper>(
    service: &FileSystemService<T, M>,
    payload: &[u8],
) -> (i64, Vec<u8>) {
    reply(decode::<MapRequest>(payload).and_then(|req| service.map(&req)))
}
