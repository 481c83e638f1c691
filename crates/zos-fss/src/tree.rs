//! Name resolution, open and close over the node tree.

use alloc::sync::Arc;

use tracing::debug;

use crate::error::{FssError, FssResult};
use crate::node::FileNode;

/// Resolve `path` relative to `start` and take a reference on the result.
///
/// A leading `/` resolves from the volume root. Empty components and `.`
/// are ignored, `..` moves to the parent (the root is its own parent).
/// Directories are materialized as they are walked.
pub fn lookup(start: &Arc<FileNode>, path: &str) -> FssResult<Arc<FileNode>> {
    let mut current = if path.starts_with('/') {
        volume_root(start)?
    } else {
        start.clone()
    };

    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if let Some(parent) = current.parent() {
                    current = parent;
                }
            }
            name => {
                if !current.is_directory() {
                    return Err(FssError::NotADirectory);
                }
                current.materialize()?;
                current = current.find_child(name).ok_or(FssError::NotFound)?;
            }
        }
    }

    current.acquire();
    Ok(current)
}

/// Resolve `name` and make sure the node holds a driver handle.
///
/// Opening an already open node does not touch the driver.
pub fn open(start: &Arc<FileNode>, name: &str) -> FssResult<Arc<FileNode>> {
    let node = lookup(start, name)?;
    match node.ensure_handle() {
        Ok(_) => {
            debug!(node = %node.path(), refs = node.ref_count(), "node opened");
            Ok(node)
        }
        Err(e) => {
            node.release();
            Err(match e {
                FssError::NotFound => FssError::NotFound,
                _ => FssError::IoError,
            })
        }
    }
}

/// Drop a reference taken by [`lookup`] or [`open`].
pub fn close(node: &Arc<FileNode>) {
    node.release();
}

fn volume_root(node: &Arc<FileNode>) -> FssResult<Arc<FileNode>> {
    node.volume()
        .map(|volume| volume.root().clone())
        .ok_or(FssError::BadFileDescriptor)
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tree_tests;
