//! Transactional File Streams
//!
//! Byte-oriented file streams that track their own read/write offset
//! independent of any live OS handle. A stream can be told its handle is
//! stale (`mark_needs_reattachment`); the next byte operation reopens the
//! backing file and seeks to the saved offset before servicing the call.
//! Only `StreamState` (path + offset) ever crosses a host boundary — the
//! handle is rebuilt lazily on the destination.

pub mod reader;
pub mod writer;

pub use reader::TransactionalReader;
pub use writer::TransactionalWriter;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Snapshot of a transactional stream: everything that survives migration.
///
/// The live file handle is deliberately absent — it cannot be serialized and
/// is re-derived from `path` + `offset` by the restored stream's first I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    /// Backing file path
    pub path: PathBuf,
    /// Byte offset of the next read/write
    pub offset: u64,
}
