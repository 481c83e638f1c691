//! Request handlers.
//!
//! One submodule per request family. Every handler releases what it
//! acquired (descriptor, capability borrow, half-opened node) before it
//! returns an error; none of them panic.

mod io;
mod map;
mod notify;
mod open;
mod readdir;

use crate::error::FssResult;

/// Outcome of a read or write request.
///
/// `file_size` is refreshed even when the transfer failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IoOutcome {
    pub result: FssResult<usize>,
    pub file_size: u64,
}

impl IoOutcome {
    fn rejected(e: crate::error::FssError) -> Self {
        Self {
            result: Err(e),
            file_size: 0,
        }
    }
}

/// Outcome of a readdir request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReaddirOutcome {
    /// Bytes of packed records written
    pub written: usize,
    /// Cursor to continue from
    pub next_entry: u32,
}

#[cfg(test)]
mod tests;
