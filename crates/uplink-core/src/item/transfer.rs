//! Per-item transfer bookkeeping: byte counters, chunk records and handles.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one outstanding transport request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(u64);

impl HandleId {
    /// Wrap a raw id value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

/// Identifier of a transfer group (the unit that occupies one concurrency slot).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(u64);

impl GroupId {
    /// Wrap a raw id value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

/// State of a single chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    /// Not dispatched yet.
    Pending,
    /// Request outstanding.
    Sent,
    /// Acknowledged by the remote end.
    Acked,
    /// Retry budget exhausted.
    Failed,
}

/// Byte-range slice of an item's payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Zero-based chunk index.
    pub index: usize,
    /// Byte offset within the payload.
    pub offset: u64,
    /// Length of this chunk in bytes.
    pub len: u64,
    /// Current chunk state.
    pub status: ChunkStatus,
    /// Number of retries already spent.
    pub retries: u32,
    /// Handle of the outstanding request, if any.
    pub handle: Option<HandleId>,
    /// Bytes reported sent for this chunk.
    pub bytes_sent: u64,
}

impl ChunkRecord {
    /// Create a pending chunk.
    #[must_use]
    pub const fn new(index: usize, offset: u64, len: u64) -> Self {
        Self {
            index,
            offset,
            len,
            status: ChunkStatus::Pending,
            retries: 0,
            handle: None,
            bytes_sent: 0,
        }
    }

    /// Exclusive end offset.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// Mutable transfer sub-record of an item.
#[derive(Clone, Debug)]
pub struct TransferRecord {
    /// Stable id sent with every chunk of this item.
    pub uuid: Uuid,
    /// Filename presented to the transport (after renaming).
    pub filename: String,
    /// Bytes reported sent so far.
    pub bytes_sent: u64,
    /// Wire-level total reported by the transport; `None` until the first progress signal.
    pub total_bytes: Option<u64>,
    /// Progress percentage (0.0 - 100.0).
    pub progress: f64,
    /// Whether the payload is sent as chunks.
    pub chunked: bool,
    /// Chunk records in payload order.
    pub chunks: Vec<ChunkRecord>,
    /// Handles currently carrying this item.
    pub handles: BTreeSet<HandleId>,
}

impl TransferRecord {
    /// Create a fresh record.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            filename: filename.into(),
            bytes_sent: 0,
            total_bytes: None,
            progress: 0.0,
            chunked: false,
            chunks: Vec::new(),
            handles: BTreeSet::new(),
        }
    }

    /// Number of chunks acknowledged so far.
    pub fn acked_chunks(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| c.status == ChunkStatus::Acked)
            .count()
    }

    /// All chunks acknowledged (false when the item is not chunked).
    pub fn all_chunks_acked(&self) -> bool {
        self.chunked && self.chunks.iter().all(|c| c.status == ChunkStatus::Acked)
    }

    /// Number of chunks with an outstanding request.
    pub fn chunks_in_flight(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| c.status == ChunkStatus::Sent)
            .count()
    }

    /// Recompute `bytes_sent` from the chunk records.
    pub fn sum_chunk_bytes(&mut self) {
        self.bytes_sent = self.chunks.iter().map(|c| c.bytes_sent).sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_end() {
        let chunk = ChunkRecord::new(1, 4, 4);
        assert_eq!(chunk.end(), 8);
        assert_eq!(chunk.status, ChunkStatus::Pending);
    }

    #[test]
    fn test_all_chunks_acked_requires_chunked() {
        let record = TransferRecord::new("a.bin");
        assert!(!record.all_chunks_acked());
    }

    #[test]
    fn test_chunk_accounting() {
        let mut record = TransferRecord::new("a.bin");
        record.chunked = true;
        record.chunks = vec![ChunkRecord::new(0, 0, 2), ChunkRecord::new(1, 2, 2)];
        record.chunks[0].status = ChunkStatus::Acked;
        record.chunks[0].bytes_sent = 2;
        record.chunks[1].status = ChunkStatus::Sent;
        record.chunks[1].bytes_sent = 1;
        record.sum_chunk_bytes();

        assert_eq!(record.bytes_sent, 3);
        assert_eq!(record.acked_chunks(), 1);
        assert_eq!(record.chunks_in_flight(), 1);
        assert!(!record.all_chunks_acked());
    }

    #[test]
    fn test_records_get_distinct_uuids() {
        let a = TransferRecord::new("a");
        let b = TransferRecord::new("a");
        assert_ne!(a.uuid, b.uuid);
    }
}
