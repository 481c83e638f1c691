use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::Ordering;

use spin::Mutex;

use crate::config::{FssConfig, FSS_CACHE_DB_SIZE};
use crate::error::FssError;
use crate::handle::HandleTable;
use crate::ipc::fss_msg::{MAP_OP_MAP, MAP_OP_UNMAP, NOTIFY_OP_REGISTER, NOTIFY_OP_UNREGISTER};
use crate::ipc::{
    parse_records, CloseRequest, MapRequest, NotifyRequest, OpenRequest, ReadRequest,
    ReaddirRequest, WriteRequest,
};
use crate::node::FileNode;
use crate::notify::{NotifyCallback, NotifyHub};
use crate::testing::{data_content, mounted_service, sample_driver, service_with, StubMapper, TestService};
use crate::types::{EventMask, FileEvent, Handle, NodeType};

fn open(service: &TestService, name: &str) -> Handle {
    service
        .open(&OpenRequest {
            name: String::from(name),
        })
        .unwrap()
        .handle
}

fn read_req(handle: Handle, block: u64) -> ReadRequest {
    ReadRequest {
        handle,
        offset: block * FSS_CACHE_DB_SIZE as u64,
        size: FSS_CACHE_DB_SIZE,
    }
}

fn readdir_req(handle: Handle, start_entry: u32, max_size: u32) -> ReaddirRequest {
    ReaddirRequest {
        handle,
        start_entry,
        max_size,
    }
}

// ============================================================================
// Open / Close
// ============================================================================

#[test]
fn test_open_reports_size() {
    let (_driver, service) = mounted_service();
    let resp = service
        .open(&OpenRequest {
            name: String::from("mem:/data"),
        })
        .unwrap();
    assert_eq!(resp.size, data_content().len() as u64);
    assert_eq!(service.handles().len(), 1);
}

#[test]
fn test_open_missing() {
    let (_driver, service) = mounted_service();
    let err = service
        .open(&OpenRequest {
            name: String::from("docs/nothing"),
        })
        .unwrap_err();
    assert_eq!(err, FssError::NotFound);
    assert!(service.handles().is_empty());
}

#[test]
fn test_capability_exhaustion_closes_node() {
    let config = FssConfig {
        max_handles: 1,
        ..FssConfig::default()
    };
    let service = service_with(config, StubMapper::new(None), NotifyHub::new());
    let driver = sample_driver("mem");
    service.register_driver(driver.clone()).unwrap();

    open(&service, "data");
    let before = driver.open_handles();
    let err = service
        .open(&OpenRequest {
            name: String::from("docs/readme"),
        })
        .unwrap_err();
    assert_eq!(err, FssError::OutOfMemory);

    let root = service.registry().default_volume().unwrap().root().clone();
    let readme = root.find_child("docs").unwrap().find_child("readme").unwrap();
    assert_eq!(readme.ref_count(), 0);
    assert!(!readme.is_open());
    // The only handle added is the one pinning /docs.
    assert_eq!(driver.open_handles(), before + 1);
}

#[test]
fn test_close_while_borrowed_defers_driver_close() {
    let (driver, service) = mounted_service();
    let handle = open(&service, "data");
    let handles = driver.open_handles();

    let node = service.handles().translate(handle).unwrap();
    service.close(&CloseRequest { handle }).unwrap();
    assert!(node.is_open());
    assert_eq!(driver.open_handles(), handles);

    let mut buf = vec![0u8; FSS_CACHE_DB_SIZE];
    assert_eq!(service.cache().read_block(&node, 0, &mut buf), Ok(FSS_CACHE_DB_SIZE));

    service.handles().put(handle, node.clone());
    assert!(!node.is_open());
    assert_eq!(driver.open_handles(), handles - 1);
}

#[test]
fn test_close_releases_handle() {
    let (driver, service) = mounted_service();
    let handle = open(&service, "data");
    let handles = driver.open_handles();

    service.close(&CloseRequest { handle }).unwrap();
    assert_eq!(driver.open_handles(), handles - 1);
    assert_eq!(
        service.close(&CloseRequest { handle }).unwrap_err(),
        FssError::BadFileDescriptor
    );
}

// ============================================================================
// Read / Write
// ============================================================================

#[test]
fn test_read_blocks() {
    let (_driver, service) = mounted_service();
    let handle = open(&service, "data");
    let mut buf = vec![0u8; FSS_CACHE_DB_SIZE];

    let outcome = service.read(&read_req(handle, 1), &mut buf);
    assert_eq!(outcome.result, Ok(100));
    assert_eq!(outcome.file_size, data_content().len() as u64);
    assert_eq!(&buf[..100], &[0xCD; 100][..]);
    assert_eq!(service.handles().borrows(handle), Some(0));
}

#[test]
fn test_wrong_size_never_reaches_driver() {
    let (driver, service) = mounted_service();
    let handle = open(&service, "data");
    let mut buf = vec![0u8; FSS_CACHE_DB_SIZE];

    let short = ReadRequest {
        handle,
        offset: 0,
        size: FSS_CACHE_DB_SIZE - 1,
    };
    assert_eq!(service.read(&short, &mut buf).result, Err(FssError::BadArgument));

    let unaligned = ReadRequest {
        handle,
        offset: 10,
        size: FSS_CACHE_DB_SIZE,
    };
    assert_eq!(service.read(&unaligned, &mut buf).result, Err(FssError::BadArgument));

    let write = WriteRequest {
        handle,
        offset: 0,
        size: FSS_CACHE_DB_SIZE,
        data: vec![0; 16],
    };
    assert_eq!(service.write(&write).result, Err(FssError::BadArgument));

    assert_eq!(driver.calls().read, 0);
    assert!(service.cache().is_empty());
}

#[test]
fn test_write_then_read() {
    let (_driver, service) = mounted_service();
    let handle = open(&service, "docs/readme");
    let data: Vec<u8> = (0..FSS_CACHE_DB_SIZE).map(|i| i as u8).collect();

    let outcome = service.write(&WriteRequest {
        handle,
        offset: 0,
        size: FSS_CACHE_DB_SIZE,
        data: data.clone(),
    });
    assert_eq!(outcome.result, Ok(FSS_CACHE_DB_SIZE));
    // Not written back yet.
    assert_eq!(outcome.file_size, 5);

    let mut buf = vec![0u8; FSS_CACHE_DB_SIZE];
    assert_eq!(service.read(&read_req(handle, 0), &mut buf).result, Ok(FSS_CACHE_DB_SIZE));
    assert_eq!(buf, data);
}

#[test]
fn test_io_on_closed_handle() {
    let (_driver, service) = mounted_service();
    let handle = open(&service, "data");
    service.close(&CloseRequest { handle }).unwrap();

    let mut buf = vec![0u8; FSS_CACHE_DB_SIZE];
    let outcome = service.read(&read_req(handle, 0), &mut buf);
    assert_eq!(outcome.result, Err(FssError::BadFileDescriptor));
    assert_eq!(outcome.file_size, 0);
}

// ============================================================================
// Readdir
// ============================================================================

#[test]
fn test_readdir_pagination() {
    let (_driver, service) = mounted_service();
    let handle = open(&service, "list");
    let mut out = vec![0u8; 6];
    let mut names = Vec::new();
    let mut cursor = 0;

    loop {
        let outcome = service.readdir(&readdir_req(handle, cursor, 6), &mut out).unwrap();
        if outcome.written == 0 {
            assert_eq!(outcome.next_entry, cursor);
            break;
        }
        assert_eq!(outcome.written, 6);
        for record in parse_records(&out[..outcome.written]) {
            assert_eq!(record.kind, NodeType::Regular);
            names.push(record.name);
        }
        cursor = outcome.next_entry;
    }

    assert_eq!(names, ["a", "b", "c", "d"]);
    assert_eq!(cursor, 4);
}

#[test]
fn test_readdir_root_kinds() {
    let (_driver, service) = mounted_service();
    let handle = open(&service, "/");
    let mut out = vec![0u8; 64];

    let outcome = service.readdir(&readdir_req(handle, 0, 64), &mut out).unwrap();
    let records = parse_records(&out[..outcome.written]);
    let kinds: Vec<(&str, NodeType)> = records.iter().map(|r| (r.name.as_str(), r.kind)).collect();
    assert_eq!(
        kinds,
        [
            ("docs", NodeType::Directory),
            ("data", NodeType::Regular),
            ("list", NodeType::Directory)
        ]
    );
    assert_eq!(outcome.next_entry, 3);
}

#[test]
fn test_readdir_truncates_first_name() {
    let (_driver, service) = mounted_service();
    let handle = open(&service, "docs");
    let mut out = vec![0u8; 3];

    let outcome = service.readdir(&readdir_req(handle, 0, 3), &mut out).unwrap();
    assert_eq!(outcome.written, 3);
    assert_eq!(outcome.next_entry, 1);
    assert_eq!(parse_records(&out)[0].name, "r");
}

#[test]
fn test_readdir_errors() {
    let (_driver, service) = mounted_service();
    let file = open(&service, "data");
    let dir = open(&service, "list");
    let mut out = vec![0u8; 16];

    assert_eq!(
        service.readdir(&readdir_req(file, 0, 16), &mut out).unwrap_err(),
        FssError::NotADirectory
    );
    assert_eq!(
        service.readdir(&readdir_req(dir, 0, 0), &mut out).unwrap_err(),
        FssError::BadArgument
    );
    assert_eq!(
        service.readdir(&readdir_req(dir, 0, 32), &mut out).unwrap_err(),
        FssError::BadArgument
    );
    assert_eq!(
        service
            .readdir(&readdir_req(Handle(999), 0, 16), &mut out)
            .unwrap_err(),
        FssError::BadFileDescriptor
    );
    assert_eq!(service.handles().borrows(file), Some(0));
}

// ============================================================================
// Notify
// ============================================================================

type Delivered = Arc<Mutex<Vec<(String, FileEvent, u64)>>>;

fn notifying_service() -> (Delivered, TestService) {
    let delivered: Delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = delivered.clone();
    let delivery: NotifyCallback = Arc::new(move |node: &FileNode, event: FileEvent, context: u64| {
        sink.lock().push((String::from(node.name()), event, context));
    });
    let service = service_with(
        FssConfig::default(),
        StubMapper::new(None),
        NotifyHub::with_delivery(delivery),
    );
    service.register_driver(sample_driver("mem")).unwrap();
    (delivered, service)
}

fn notify_req(handle: Handle, mask: EventMask, op: u32) -> NotifyRequest {
    NotifyRequest {
        handle,
        mask,
        op,
        context: 42,
    }
}

#[test]
fn test_notify_register_and_unregister() {
    let (delivered, service) = notifying_service();
    let handle = open(&service, "data");
    let mut buf = vec![0u8; FSS_CACHE_DB_SIZE];

    service
        .notify_request(&notify_req(handle, EventMask::WRITE, NOTIFY_OP_REGISTER))
        .unwrap();
    service.read(&read_req(handle, 0), &mut buf);
    service.write(&WriteRequest {
        handle,
        offset: 0,
        size: FSS_CACHE_DB_SIZE,
        data: buf.clone(),
    });
    assert_eq!(
        *delivered.lock(),
        [(String::from("data"), FileEvent::Write, 42)]
    );

    service
        .notify_request(&notify_req(handle, EventMask::WRITE, NOTIFY_OP_UNREGISTER))
        .unwrap();
    service.write(&WriteRequest {
        handle,
        offset: 0,
        size: FSS_CACHE_DB_SIZE,
        data: buf,
    });
    assert_eq!(delivered.lock().len(), 1);

    assert_eq!(
        service
            .notify_request(&notify_req(handle, EventMask::WRITE, NOTIFY_OP_UNREGISTER))
            .unwrap_err(),
        FssError::NotFound
    );
}

#[test]
fn test_notify_bad_requests() {
    let (_delivered, service) = notifying_service();
    let handle = open(&service, "data");

    assert_eq!(
        service.notify_request(&notify_req(handle, EventMask::ALL, 9)).unwrap_err(),
        FssError::BadArgument
    );
    assert_eq!(
        service
            .notify_request(&notify_req(Handle(77), EventMask::ALL, NOTIFY_OP_REGISTER))
            .unwrap_err(),
        FssError::BadArgument
    );
    assert_eq!(
        service
            .notify_request(&notify_req(handle, EventMask::default(), NOTIFY_OP_REGISTER))
            .unwrap_err(),
        FssError::BadArgument
    );
    assert_eq!(service.handles().borrows(handle), Some(0));
}

#[test]
fn test_notify_without_delivery() {
    let (_driver, service) = mounted_service();
    let handle = open(&service, "data");
    assert_eq!(
        service
            .notify_request(&notify_req(handle, EventMask::READ, NOTIFY_OP_REGISTER))
            .unwrap_err(),
        FssError::NotSupported
    );
}

// ============================================================================
// Map
// ============================================================================

#[test]
fn test_map_file() {
    let (_driver, service) = mounted_service();
    let handle = open(&service, "data");

    let resp = service
        .map(&MapRequest {
            handle,
            protection: 0x01,
            op: MAP_OP_MAP,
        })
        .unwrap();
    assert_eq!(resp.base, 0x4000_0000);
    assert_eq!(resp.size, data_content().len() as u64);
    assert_eq!(service.handles().borrows(handle), Some(0));
}

#[test]
fn test_map_errors() {
    let service = service_with(FssConfig::default(), StubMapper::new(None), NotifyHub::new());
    service.register_driver(sample_driver("mem")).unwrap();
    let handle = open(&service, "data");

    let req = |op| MapRequest {
        handle,
        protection: 0x03,
        op,
    };
    assert_eq!(service.map(&req(MAP_OP_UNMAP)).unwrap_err(), FssError::NotSupported);
    assert_eq!(service.map(&req(0)).unwrap_err(), FssError::BadArgument);
    assert_eq!(service.mapper.calls.load(Ordering::Acquire), 0);

    assert_eq!(service.map(&req(MAP_OP_MAP)).unwrap_err(), FssError::OutOfMemory);
    assert_eq!(service.mapper.calls.load(Ordering::Acquire), 1);
    assert_eq!(service.handles().borrows(handle), Some(0));

    let stale = MapRequest {
        handle: Handle(500),
        protection: 0,
        op: MAP_OP_MAP,
    };
    assert_eq!(service.map(&stale).unwrap_err(), FssError::BadFileDescriptor);
}
